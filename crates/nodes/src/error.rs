//! Action-level error type.

use thiserror::Error;

/// Errors returned by an [`ActionExecutor`](crate::ActionExecutor).
///
/// The engine treats both variants as a failed action. The distinction only
/// matters to executors that apply their own retry policy (see [`Retrying`](crate::Retrying)):
/// - `Retryable` — a transient failure worth another attempt.
/// - `Fatal`     — a permanent failure; retrying will not help.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Transient failure.
    #[error("retryable action error: {0}")]
    Retryable(String),

    /// Permanent failure.
    #[error("fatal action error: {0}")]
    Fatal(String),
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
