//! Channel pair for two parties living in the same process.
use crate::{channel, Channel};
use remoc::RemoteSend;

/// Create two crossed channels: what one party sends, the other receives.
/// Intended for tests and benchmarks that run both parties locally.
pub fn new_pair<T: RemoteSend>() -> (Channel<T>, Channel<T>) {
    let (left_sender, left_receiver) = channel();
    let (right_sender, right_receiver) = channel();

    ((left_sender, right_receiver), (right_sender, left_receiver))
}

#[cfg(test)]
mod tests {
    use super::new_pair;

    #[tokio::test]
    async fn halves_are_crossed() {
        let ((ping_tx, mut ping_rx), (pong_tx, mut pong_rx)) = new_pair::<String>();
        ping_tx.send("ping".into()).await.unwrap();
        assert_eq!(pong_rx.recv().await.unwrap().as_deref(), Some("ping"));
        pong_tx.send("pong".into()).await.unwrap();
        assert_eq!(ping_rx.recv().await.unwrap().as_deref(), Some("pong"));
    }
}
