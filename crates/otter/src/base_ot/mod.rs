//! Naor-Pinkas base OT protocol.
//!
//! One-round 1-out-of-2 OT in the Ristretto group. The sender publishes
//! `S = g^y` once per batch; the receiver blinds each choice as
//! `R = S^b * g^x` so that exactly one of the two derived keys is known to
//! it. Security rests on DDH against semi-honest adversaries.
use crate::traits::{BaseOTReceiver, BaseOTSender, Error};
use crate::util::Block;
use crate::Rom128;
use async_trait::async_trait;
use bitvec::slice::BitSlice;
use blake2::Digest;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone)]
pub struct Sender;

#[derive(Debug, Default, Clone)]
pub struct Receiver;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum BaseOTMsg {
    Setup(RistrettoPoint),
    Points(Vec<RistrettoPoint>),
    Ciphertexts(Vec<[Block; 2]>),
}

impl Sender {
    pub fn new() -> Self {
        Sender
    }
}

impl Receiver {
    pub fn new() -> Self {
        Receiver
    }
}

#[async_trait]
impl BaseOTSender for Sender {
    type Msg = BaseOTMsg;

    #[allow(non_snake_case)]
    #[tracing::instrument(level = "debug", skip(self, msgs, rng, sender, receiver))]
    async fn send<RNG>(
        &mut self,
        msgs: &[[Block; 2]],
        rng: &mut RNG,
        sender: net_channel::Sender<Self::Msg>,
        mut receiver: net_channel::Receiver<Self::Msg>,
    ) -> Result<(), Error<Self::Msg>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let y = Scalar::random(rng);
        let S = RISTRETTO_BASEPOINT_TABLE * &y;
        let T = S * y;
        sender.send(BaseOTMsg::Setup(S)).await.map_err(Error::Send)?;
        tracing::trace!("Sent setup point");
        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let points = match msg {
            BaseOTMsg::Points(points) => points,
            msg => return Err(Error::WrongOrder(msg)),
        };
        if points.len() != msgs.len() {
            return Err(Error::ProtocolDeviation);
        }
        tracing::trace!("Received blinded points");
        let ciphertexts = points
            .into_iter()
            .zip(msgs)
            .enumerate()
            .map(|(i, (R, [m0, m1]))| {
                let Ry = R * y;
                let w0 = rom_hash_point(&Ry, i);
                // (R * S^-1)^y == R^y - T
                let w1 = rom_hash_point(&(Ry - T), i);
                [*m0 ^ w0, *m1 ^ w1]
            })
            .collect();
        sender
            .send(BaseOTMsg::Ciphertexts(ciphertexts))
            .await
            .map_err(Error::Send)?;
        tracing::trace!("Sent ciphertexts");
        Ok(())
    }
}

#[async_trait]
impl BaseOTReceiver for Receiver {
    type Msg = BaseOTMsg;

    #[allow(non_snake_case)]
    #[tracing::instrument(level = "debug", skip(self, choices, rng, sender, receiver))]
    async fn receive<RNG>(
        &mut self,
        choices: &BitSlice,
        rng: &mut RNG,
        sender: net_channel::Sender<Self::Msg>,
        mut receiver: net_channel::Receiver<Self::Msg>,
    ) -> Result<Vec<Block>, Error<Self::Msg>>
    where
        RNG: RngCore + CryptoRng + Send,
    {
        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let S = match msg {
            BaseOTMsg::Setup(S) => S,
            msg => return Err(Error::WrongOrder(msg)),
        };
        tracing::trace!("Received setup point");
        let (xs, Rs): (Vec<_>, Vec<_>) = choices
            .iter()
            .map(|choice| {
                let x = Scalar::random(rng);
                let gx = RISTRETTO_BASEPOINT_TABLE * &x;
                let R = if *choice { S + gx } else { gx };
                (x, R)
            })
            .unzip();
        sender
            .send(BaseOTMsg::Points(Rs))
            .await
            .map_err(Error::Send)?;
        tracing::trace!("Sent blinded points");
        let msg = receiver
            .recv()
            .await
            .map_err(Error::Receive)?
            .ok_or(Error::UnexpectedTermination)?;
        let ciphertexts = match msg {
            BaseOTMsg::Ciphertexts(cts) => cts,
            msg => return Err(Error::WrongOrder(msg)),
        };
        if ciphertexts.len() != choices.len() {
            return Err(Error::ProtocolDeviation);
        }
        tracing::trace!("Received ciphertexts");
        let out = xs
            .into_iter()
            .zip(choices)
            .zip(ciphertexts)
            .enumerate()
            .map(|(i, ((x, choice), ct))| {
                let k = rom_hash_point(&(S * x), i);
                ct[*choice as usize] ^ k
            })
            .collect();
        Ok(out)
    }
}

/// Hash a point and counter to a block using the 128 bit ROM.
fn rom_hash_point(point: &RistrettoPoint, counter: usize) -> Block {
    let mut rom = Rom128::new();
    rom.update(point.compress().as_bytes());
    rom.update(counter.to_le_bytes());
    let out = rom.finalize();
    Block::from_le_bytes(out.into())
}

#[cfg(test)]
mod tests {
    use crate::base_ot::{Receiver, Sender};
    use crate::traits::{BaseOTReceiver, BaseOTSender};
    use crate::util::Block;
    use bitvec::bitvec;
    use bitvec::vec::BitVec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[tokio::test]
    async fn base_ot() {
        let (ch1, ch2) = net_channel::in_memory::new_pair();
        let mut rng_send = StdRng::seed_from_u64(42);
        let mut rng_recv = StdRng::seed_from_u64(42 * 42);
        let msgs: Vec<[Block; 2]> = (0..128).map(|_| rng_send.gen()).collect();
        let choices: BitVec = (0..128).map(|_| rng_recv.gen::<bool>()).collect();

        let mut sender = Sender;
        let mut receiver = Receiver;
        let send = sender.send(&msgs, &mut rng_send, ch1.0, ch1.1);
        let receive = receiver.receive(&choices, &mut rng_recv, ch2.0, ch2.1);

        let (_, received) = tokio::try_join!(send, receive).unwrap();
        for ((recv, pair), choice) in received.into_iter().zip(msgs).zip(choices) {
            assert_eq!(recv, pair[choice as usize]);
            assert_ne!(recv, pair[!choice as usize]);
        }
    }

    #[tokio::test]
    async fn all_zero_choices() {
        let (ch1, ch2) = net_channel::in_memory::new_pair();
        let mut rng_send = StdRng::seed_from_u64(1);
        let mut rng_recv = StdRng::seed_from_u64(2);
        let msgs: Vec<[Block; 2]> = (0..32).map(|_| rng_send.gen()).collect();
        let choices = bitvec![0; 32];

        let mut sender = Sender;
        let mut receiver = Receiver;
        let send = sender.send(&msgs, &mut rng_send, ch1.0, ch1.1);
        let receive = receiver.receive(&choices, &mut rng_recv, ch2.0, ch2.1);
        let (_, received) = tokio::try_join!(send, receive).unwrap();
        for (recv, [m0, _]) in received.into_iter().zip(msgs) {
            assert_eq!(recv, m0);
        }
    }
}
