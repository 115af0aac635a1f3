//! Typed channels for two-party protocol runs.
//!
//! A protocol run owns one [`Channel`]: a pair of [`Sender`] and [`Receiver`]
//! halves moving one serde message type over a [remoc](https://docs.rs/remoc)
//! session. Channels are reliable and in-order, and a channel error always
//! aborts the run that hit it. Receiver halves are themselves sendable, so a
//! protocol can hand a nested channel to a sub-protocol by shipping one half
//! to the peer (see [`sub_channel`]).
use remoc::rch::{base, mpsc};
use remoc::{codec, RemoteSend};

pub mod in_memory;
pub mod metered;
pub mod tcp;

/// Messages a channel keeps in flight before applying backpressure.
pub const CHANNEL_BUFFER: usize = 128;

/// Sending half of the connection-level channel (see [`tcp::Connection`]).
pub type BaseSender<T> = base::Sender<T, codec::Bincode>;
/// Receiving half of the connection-level channel.
pub type BaseReceiver<T> = base::Receiver<T, codec::Bincode>;

/// Sending half of a protocol channel.
pub type Sender<T> = mpsc::Sender<T, codec::Bincode, CHANNEL_BUFFER>;
/// Receiving half of a protocol channel.
pub type Receiver<T> = mpsc::Receiver<T, codec::Bincode, CHANNEL_BUFFER>;

/// Both halves of a protocol channel.
pub type Channel<T> = (Sender<T>, Receiver<T>);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error sending value")]
    Send(mpsc::SendError<()>),
    #[error("Error receiving value")]
    Receive(#[from] mpsc::RecvError),
    #[error("Error sending value on the connection-level channel")]
    ConnectionSend(base::SendErrorKind),
    #[error("Error receiving value on the connection-level channel")]
    ConnectionReceive(#[from] base::RecvError),
    #[error("The remote closed the channel")]
    Closed,
    #[error("Received an unexpected message")]
    UnexpectedMessage,
}

/// Create the two halves of an unconnected channel.
///
/// Sending the [`Receiver`] half over an established channel connects it to
/// the local [`Sender`].
pub fn channel<T: RemoteSend>() -> Channel<T> {
    let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER);
    (
        sender.set_buffer::<CHANNEL_BUFFER>(),
        receiver.set_buffer::<CHANNEL_BUFFER>(),
    )
}

/// Open a protocol channel over an established connection.
///
/// Both parties call this concurrently with the same `SubMsg` type: each side
/// creates a fresh half-pair and ships the receiving half to the peer through
/// the connection-level channel.
#[tracing::instrument(skip_all)]
pub async fn sub_channel<Msg, SubMsg>(
    sender: &mut BaseSender<Msg>,
    receiver: &mut BaseReceiver<Msg>,
) -> Result<Channel<SubMsg>, Error>
where
    Msg: From<Receiver<SubMsg>> + Into<Option<Receiver<SubMsg>>> + RemoteSend,
    SubMsg: RemoteSend,
{
    let (sub_sender, remote_half) = channel();
    sender.send(remote_half.into()).await?;
    let msg = receiver.recv().await?.ok_or(Error::Closed)?;
    let sub_receiver = msg.into().ok_or(Error::UnexpectedMessage)?;
    tracing::debug!("Opened sub channel");
    Ok((sub_sender, sub_receiver))
}

impl<T> From<base::SendError<T>> for Error {
    fn from(err: base::SendError<T>) -> Self {
        Error::ConnectionSend(err.kind)
    }
}

impl<T> From<mpsc::SendError<T>> for Error {
    fn from(err: mpsc::SendError<T>) -> Self {
        Error::Send(err.without_item())
    }
}
