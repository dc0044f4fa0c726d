use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DbError, DbResult};

/// Cancellation signal accepted by every store operation.
///
/// Clones share the same flag, so a token handed to a long-running query
/// can be cancelled from another thread.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(DbError::Cancelled)` once the token has been cancelled.
    #[inline]
    pub fn check(&self) -> DbResult<()> {
        if self.is_cancelled() {
            Err(DbError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        let other = token.clone();
        token.cancel();

        assert!(other.is_cancelled());
        assert!(matches!(other.check(), Err(DbError::Cancelled)));
    }
}
