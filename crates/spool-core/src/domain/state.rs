//! Batch and item state machines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch job state.
///
/// Transitions:
/// - Pending -> Processing -> Completed (every item succeeded)
/// - Pending -> Processing -> Failed (every item failed)
/// - Pending -> Processing -> Partial (mixed outcome)
/// - Pending | Processing -> Cancelled
///
/// `Completed`, `Failed`, `Partial` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Partial,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::Failed | BatchState::Cancelled | BatchState::Partial
        )
    }

    /// Outcome of a batch whose items have all settled.
    pub fn settled(completed: usize, failed: usize) -> Self {
        match (completed, failed) {
            (_, 0) => BatchState::Completed,
            (0, _) => BatchState::Failed,
            _ => BatchState::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchState::Pending => "pending",
            BatchState::Processing => "processing",
            BatchState::Completed => "completed",
            BatchState::Failed => "failed",
            BatchState::Cancelled => "cancelled",
            BatchState::Partial => "partial",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item state. An item of a cancelled batch that never started stays `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Completed | ItemState::Failed)
    }
}
