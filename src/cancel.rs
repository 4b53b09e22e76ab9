//! A cooperative cancellation signal a caller can thread through a single
//! execution, distinct from the overall/idle timeouts the executor enforces
//! on its own.
//!
//! There's no `Context` type in this crate's stack (see DESIGN.md's Open
//! Question resolution for §4.4), so cancellation is modeled the same way
//! the tailer's shutdown signal is: a `tokio::sync::watch<bool>` pair. The
//! handle side lives with whatever caller decided to cancel; the token side
//! is handed to `Executor::execute_with_streaming`/`execute_command` and
//! raced against the child's exit inside the pipeline.

use tokio::sync::watch;

/// The caller-held half of a cancellation pair. Dropping it without ever
/// calling [`cancel`](Self::cancel) is equivalent to never cancelling.
#[derive(Debug, Clone)]
pub struct CancelHandle(watch::Sender<bool>);

/// The executor-held half of a cancellation pair, passed into an execution.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

/// Creates a linked `(handle, token)` pair. The handle cancels; the token
/// observes.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    /// Requests cancellation. Idempotent; a second call is a no-op.
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl CancelToken {
    /// True if [`CancelHandle::cancel`] has already been called.
    pub fn is_canceled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the linked handle cancels. Resolves immediately if it
    /// already has. Never resolves if the handle is dropped without
    /// cancelling — the executor's own timeouts still bound the wait.
    pub async fn canceled(&mut self) {
        loop {
            if *self.0.borrow() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/cancel_tests.rs"]
mod tests;
