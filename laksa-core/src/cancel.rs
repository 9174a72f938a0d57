//! Cancellation handles.
//!
//! Every public operation accepts a [`CancelHandle`]. Cancellation aborts
//! in-flight HTTP requests, returns backoff sleeps immediately, and releases
//! the current credential without success/failure accounting.

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Any operation observing this handle stops as
    /// soon as possible and yields `LlmError::Canceled`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_pending_waiters() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        handle.cancel();

        tokio::time::timeout(std::time::Duration::from_millis(200), task)
            .await
            .expect("cancel should wake the waiting task")
            .expect("task ok");
        assert!(handle.is_cancelled());
    }
}
