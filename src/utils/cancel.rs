//! Cancellation utilities
//!
//! Provides first-class cancellation handles for streams and long-running operations.

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Any wrapped streams/futures observing this handle
    /// will stop as soon as possible. Dropping the cancelled stream closes the
    /// underlying HTTP connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Wrap a stream so it ends as soon as `handle` is cancelled.
///
/// A pending `next()` is woken immediately on cancellation and the inner
/// stream is dropped without being polled again.
pub fn make_cancellable_stream<T>(
    stream: Pin<Box<dyn Stream<Item = T> + Send>>,
    handle: &CancelHandle,
) -> Pin<Box<dyn Stream<Item = T> + Send>>
where
    T: Send + 'static,
{
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        loop {
            if token.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_pending_next_immediately() {
        // A stream that never yields and never ends.
        let pending: Pin<Box<dyn Stream<Item = u8> + Send>> =
            Box::pin(futures_util::stream::pending());
        let cancel = CancelHandle::new();
        let mut s = make_cancellable_stream(pending, &cancel);

        let waiter = tokio::spawn(async move { s.next().await });

        // Give the task a chance to poll and block on `next()`.
        tokio::task::yield_now().await;

        cancel.cancel();

        let out = tokio::time::timeout(std::time::Duration::from_millis(200), waiter)
            .await
            .expect("cancel should wake the waiting task")
            .expect("task ok");

        assert!(out.is_none());
    }

    #[tokio::test]
    async fn already_cancelled_stream_yields_nothing() {
        let items: Pin<Box<dyn Stream<Item = u8> + Send>> =
            Box::pin(futures_util::stream::iter(vec![1, 2, 3]));
        let cancel = CancelHandle::new();
        cancel.cancel();
        let out: Vec<u8> = make_cancellable_stream(items, &cancel).collect().await;
        assert!(out.is_empty());
    }
}
