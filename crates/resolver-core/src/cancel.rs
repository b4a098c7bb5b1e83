//! Cooperative cancellation for an in-flight download task (§4.11).
//!
//! Each `DownloadTask` gets its own `CancellationToken`, cloned into every
//! future driving that task (the transfer loop and, via `TaskControl`, the
//! pause/resume waiter). `cancel_download` flips the flag once; every clone
//! observes it on its next poll of the transfer loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Short-circuit a transfer loop iteration once cancellation has been
    /// requested.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download was cancelled")
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for crate::error::Error {
    fn from(_: CancelledError) -> Self {
        crate::error::Error::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn clones_observe_cancellation_from_any_clone() {
        let task_token = CancellationToken::new();
        let transfer_loop_token = task_token.clone();

        task_token.cancel();

        assert!(transfer_loop_token.is_cancelled());
        assert!(transfer_loop_token.check().is_err());
    }

    #[test]
    fn check_maps_to_the_crate_cancelled_error() {
        let token = CancellationToken::new();
        token.cancel();
        let err: crate::error::Error = token.check().unwrap_err().into();
        assert!(matches!(err, crate::error::Error::Cancelled));
    }
}
