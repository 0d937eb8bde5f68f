use thiserror::Error;

use crate::domain::{BatchId, BatchState};

/// Structural errors surfaced synchronously to the caller of a scheduler
/// operation. Per-item failures never show up here.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("batch not found: {0}")]
    NotFound(BatchId),

    #[error("cannot {action} batch {id} in state {state}")]
    InvalidState {
        id: BatchId,
        state: BatchState,
        action: &'static str,
    },

    #[error("operation not registered: {0}")]
    UnknownOperation(String),

    #[error("duplicate operation: {0}")]
    DuplicateOperation(String),

    #[error("batch task for {id} aborted: {reason}")]
    Aborted { id: BatchId, reason: String },
}

/// Failure of one attempt of a caller-supplied item operation.
///
/// Absorbed by the item executor: retried, then recorded on the item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wrap any displayable error, e.g. `.map_err(OperationError::from_display)`.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for OperationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for OperationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
