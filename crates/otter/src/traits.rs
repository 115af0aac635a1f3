//! Oblivious transfer traits.
use crate::util::Block;
use async_trait::async_trait;
use bitvec::slice::BitSlice;
use rand::{CryptoRng, RngCore};
use remoc::rch::mpsc::{RecvError, SendError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error<Msg> {
    #[error("Error sending value")]
    Send(#[from] SendError<Msg>),
    #[error("Error receiving value")]
    Receive(#[from] RecvError),
    #[error("Received out of order message")]
    WrongOrder(Msg),
    #[error("The other party terminated the protocol")]
    UnexpectedTermination,
    #[error("The other party deviated from the protocol")]
    ProtocolDeviation,
    #[error("Error in base OT execution")]
    BaseOT(Box<dyn std::error::Error + Send>),
}

/// Sender of 1-out-of-2 OTs for chosen message pairs.
#[async_trait]
pub trait BaseOTSender {
    type Msg;

    /// Obliviously transfer one block of every pair in `msgs`.
    async fn send<RNG>(
        &mut self,
        msgs: &[[Block; 2]],
        rng: &mut RNG,
        sender: net_channel::Sender<Self::Msg>,
        receiver: net_channel::Receiver<Self::Msg>,
    ) -> Result<(), Error<Self::Msg>>
    where
        RNG: RngCore + CryptoRng + Send;
}

/// Receiver of 1-out-of-2 OTs.
#[async_trait]
pub trait BaseOTReceiver {
    type Msg;

    /// Receive one block per choice bit, `msgs[i][choices[i]]`.
    async fn receive<RNG>(
        &mut self,
        choices: &BitSlice,
        rng: &mut RNG,
        sender: net_channel::Sender<Self::Msg>,
        receiver: net_channel::Receiver<Self::Msg>,
    ) -> Result<Vec<Block>, Error<Self::Msg>>
    where
        RNG: RngCore + CryptoRng + Send;
}
