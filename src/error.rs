// src/error.rs
//! Error types for the kernel
//!
//! Admission outcomes (shed/reject/defer) are decisions, not errors, and
//! never surface here. `KernelError` covers handler failures and lifecycle
//! misuse only.

use thiserror::Error;

/// Errors produced by the kernel or by agent handlers
#[derive(Debug, Error)]
pub enum KernelError {
    /// The agent catalog has no agent registered under this id
    #[error("agent '{0}' not found in catalog")]
    AgentNotFound(String),

    /// Handler observed its cancellation signal and stopped early
    #[error("dispatch canceled")]
    Canceled,

    /// Handler failed for a reason the retry policy may act on
    #[error("handler failed: {0}")]
    Handler(String),

    /// Lifecycle misuse (start called twice, enqueue after stop, ...)
    #[error("kernel lifecycle error: {0}")]
    Lifecycle(String),
}

impl KernelError {
    /// Cancellation-class failures are never retried.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, KernelError::Canceled)
    }
}

/// Convenience result type used throughout the kernel
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_class() {
        assert!(KernelError::Canceled.is_cancellation());
        assert!(!KernelError::Handler("boom".into()).is_cancellation());
        assert!(!KernelError::AgentNotFound("a".into()).is_cancellation());
    }
}
