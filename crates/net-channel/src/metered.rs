//! Byte metering for the raw transport.
use pin_project::pin_project;
use std::io::{self, IoSlice};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Shared byte counter. Clones observe the same count.
#[derive(Clone, Default, Debug)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// IO wrapper counting the bytes moved through it.
///
/// Each half of a split stream gets its own `Metered`, so one instance only
/// ever counts one direction.
#[pin_project]
pub struct Metered<S> {
    #[pin]
    inner: S,
    count: Counter,
}

impl<S> Metered<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            count: Counter::default(),
        }
    }

    /// Handle onto the byte count, usable after the wrapper is consumed.
    pub fn counter(&self) -> Counter {
        self.count.clone()
    }
}

impl<S: AsyncRead> AsyncRead for Metered<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let filled_before = buf.filled().len();
        let this = self.project();
        let poll = this.inner.poll_read(cx, buf);
        this.count.add(buf.filled().len() - filled_before);
        poll
    }
}

impl<S: AsyncWrite> AsyncWrite for Metered<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let poll = this.inner.poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &poll {
            this.count.add(*written);
        }
        poll
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let poll = this.inner.poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(written)) = &poll {
            this.count.add(*written);
        }
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn counter_clones_share_state() {
        let counter = Counter::default();
        let observer = counter.clone();
        counter.add(3);
        counter.add(4);
        assert_eq!(observer.get(), 7);
    }

    #[tokio::test]
    async fn metered_duplex_counts_both_directions() {
        let (near, far) = tokio::io::duplex(64);
        let mut near = Metered::new(near);
        let mut far = Metered::new(far);
        let sent = near.counter();
        let received = far.counter();

        near.write_all(b"five!").await.unwrap();
        let mut buf = [0_u8; 5];
        far.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"five!");
        assert_eq!(sent.get(), 5);
        assert_eq!(received.get(), 5);
    }
}
