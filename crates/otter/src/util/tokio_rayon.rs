//! Tokio + Rayon compatibility
//!
//! Adapted from <https://github.com/andybarron/tokio-rayon>
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;
use tokio::sync::oneshot;

/// Spawn a compute intensive function into the global rayon threadpool.
pub fn spawn_compute<F, R>(func: F) -> AsyncRayonHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    rayon::spawn(move || {
        let ret = catch_unwind(AssertUnwindSafe(func));
        // Ignore error as this means the receiver has been dropped and the result is not needed
        // anymore
        let _res = tx.send(ret);
    });

    AsyncRayonHandle { rx }
}

/// Async handle for a blocking task running in a Rayon thread pool.
///
/// If the spawned task panics, `poll()` will propagate the panic.
#[must_use]
#[derive(Debug)]
pub struct AsyncRayonHandle<T> {
    pub(crate) rx: oneshot::Receiver<thread::Result<T>>,
}

impl<T> Future for AsyncRayonHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);
        rx.poll(cx).map(|result| {
            result
                .expect("Unreachable error: Tokio channel closed")
                .unwrap_or_else(|err| resume_unwind(err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_compute_works() {
        let result = spawn_compute(|| 1337_usize).await;
        assert_eq!(result, 1337);
    }

    #[tokio::test]
    #[should_panic(expected = "Task failed successfully")]
    async fn spawn_compute_propagates_panic() {
        let handle = spawn_compute(|| {
            panic!("Task failed successfully");
        });
        handle.await;
    }
}
