//! Lifecycle events published while a batch runs.

use serde::Serialize;

use super::ids::BatchId;
use super::progress::BatchProgress;
use super::state::BatchState;

/// Discriminant of a [`BatchEvent`], handy for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEventKind {
    Started,
    ItemStarted,
    ItemCompleted,
    ItemFailed,
    Progress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        batch_id: BatchId,
        total: usize,
    },
    ItemStarted {
        batch_id: BatchId,
        index: usize,
        item_id: String,
    },
    ItemCompleted {
        batch_id: BatchId,
        index: usize,
        item_id: String,
        result: serde_json::Value,
    },
    ItemFailed {
        batch_id: BatchId,
        index: usize,
        item_id: String,
        error: String,
        attempts: u32,
    },
    Progress {
        batch_id: BatchId,
        progress: BatchProgress,
    },
    Completed {
        batch_id: BatchId,
        state: BatchState,
        progress: BatchProgress,
    },
    Cancelled {
        batch_id: BatchId,
        progress: BatchProgress,
    },
}

impl BatchEvent {
    pub fn batch_id(&self) -> BatchId {
        match self {
            BatchEvent::Started { batch_id, .. }
            | BatchEvent::ItemStarted { batch_id, .. }
            | BatchEvent::ItemCompleted { batch_id, .. }
            | BatchEvent::ItemFailed { batch_id, .. }
            | BatchEvent::Progress { batch_id, .. }
            | BatchEvent::Completed { batch_id, .. }
            | BatchEvent::Cancelled { batch_id, .. } => *batch_id,
        }
    }

    pub fn kind(&self) -> BatchEventKind {
        match self {
            BatchEvent::Started { .. } => BatchEventKind::Started,
            BatchEvent::ItemStarted { .. } => BatchEventKind::ItemStarted,
            BatchEvent::ItemCompleted { .. } => BatchEventKind::ItemCompleted,
            BatchEvent::ItemFailed { .. } => BatchEventKind::ItemFailed,
            BatchEvent::Progress { .. } => BatchEventKind::Progress,
            BatchEvent::Completed { .. } => BatchEventKind::Completed,
            BatchEvent::Cancelled { .. } => BatchEventKind::Cancelled,
        }
    }
}
