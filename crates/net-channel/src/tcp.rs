//! TCP transport.
use crate::metered::{Counter, Metered};
use crate::{BaseReceiver, BaseSender};
use remoc::{codec, RemoteSend};
use std::fmt::Debug;
use std::io;
use std::net::Ipv4Addr;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("Tcp connection failed")]
    Io(#[from] io::Error),
    #[error("Establishing the remoc session failed")]
    Handshake(#[from] remoc::ConnectError<io::Error, io::Error>),
}

/// An established connection to the other party.
///
/// The connection-level channel carries `T`; protocol channels are opened on
/// top of it with [`sub_channel`](`crate::sub_channel`). The counters track
/// raw bytes on the socket, including framing overhead.
pub struct Connection<T: RemoteSend> {
    pub sender: BaseSender<T>,
    pub receiver: BaseReceiver<T>,
    pub bytes_sent: Counter,
    pub bytes_received: Counter,
}

impl<T: RemoteSend> Connection<T> {
    async fn establish(stream: TcpStream) -> Result<Self, ConnectError> {
        // protocol messages should hit the wire immediately
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let reader = Metered::new(read_half);
        let writer = Metered::new(write_half);
        let bytes_received = reader.counter();
        let bytes_sent = writer.counter();

        let mut cfg = remoc::Cfg::balanced();
        cfg.receive_buffer = 8 * 1024 * 1024;
        cfg.chunk_size = 512 * 1024;
        let (session, sender, receiver) =
            remoc::Connect::io_buffered::<_, _, _, _, codec::Bincode>(cfg, reader, writer, 4096)
                .await?;
        tokio::spawn(session);

        Ok(Self {
            sender,
            receiver,
            bytes_sent,
            bytes_received,
        })
    }
}

/// Bind `addr` and wait for the other party to connect.
#[tracing::instrument(err)]
pub async fn listen<T: RemoteSend>(
    addr: impl ToSocketAddrs + Debug,
) -> Result<Connection<T>, ConnectError> {
    let listener = TcpListener::bind(addr).await?;
    let (stream, peer) = listener.accept().await?;
    info!(?peer, "Accepted connection");
    Connection::establish(stream).await
}

/// Connect to a listening party.
#[tracing::instrument(err)]
pub async fn connect<T: RemoteSend>(
    addr: impl ToSocketAddrs + Debug,
) -> Result<Connection<T>, ConnectError> {
    let stream = TcpStream::connect(addr).await?;
    info!("Connected to remote");
    Connection::establish(stream).await
}

/// Two connected parties on a random localhost port. Intended for tests.
pub async fn local_pair<T: RemoteSend>() -> Result<(Connection<T>, Connection<T>), ConnectError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let accept = async {
        let (stream, _) = listener.accept().await?;
        Ok::<_, io::Error>(stream)
    };
    let (accepted, connected) = tokio::try_join!(accept, TcpStream::connect(addr))?;
    tokio::try_join!(
        Connection::establish(accepted),
        Connection::establish(connected),
    )
}

#[cfg(test)]
mod tests {
    use super::local_pair;
    use crate::{sub_channel, Receiver};

    #[tokio::test]
    async fn sub_channels_carry_messages_both_ways() {
        let (mut server, mut client) = local_pair::<Receiver<u64>>().await.unwrap();

        let server_side = async {
            let (tx, mut rx) = sub_channel(&mut server.sender, &mut server.receiver)
                .await
                .unwrap();
            tx.send(7_u64).await.unwrap();
            rx.recv().await.unwrap()
        };
        let client_side = async {
            let (tx, mut rx) = sub_channel(&mut client.sender, &mut client.receiver)
                .await
                .unwrap();
            tx.send(13_u64).await.unwrap();
            rx.recv().await.unwrap()
        };
        let (from_client, from_server) = tokio::join!(server_side, client_side);

        assert_eq!(from_client, Some(13));
        assert_eq!(from_server, Some(7));
        assert!(server.bytes_sent.get() > 0);
        assert!(server.bytes_received.get() > 0);
        assert!(client.bytes_sent.get() > 0);
        assert!(client.bytes_received.get() > 0);
    }
}
