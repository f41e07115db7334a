//! # Cooperative cancellation
//!
//! A minimal cancellation token checked at clause boundaries and at
//! worker-pool iteration boundaries. The core has no opinion on wall
//! clock timeouts — a host that wants those builds them on top by
//! starting a timer thread (or checking elapsed time some other way) and
//! calling `cancel()` on a token it handed to the executor; see
//! `demos/rust/` for one way to wire that up.

use crate::error::CancelledError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Cloning shares the same underlying flag; any
/// clone calling `cancel()` is visible to every other clone and to the
/// `CancellationToken` it was derived from.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// A token that can never be cancelled; the zero-cost default for
    /// callers that don't need cancellation.
    pub fn none() -> Self {
        CancellationToken::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Checked at clause and worker-pool iteration boundaries. `Err` once
    /// cancellation has been requested, `Ok(())` otherwise.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// A cloneable handle that only exposes `cancel()`, for handing to a
    /// supervising thread that should not be able to read the flag back.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }
}

/// Write-only view of a `CancellationToken`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn handle_can_cancel_but_not_read() {
        let token = CancellationToken::new();
        let handle = token.handle();
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn check_fails_only_after_cancellation() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.check().is_err());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
