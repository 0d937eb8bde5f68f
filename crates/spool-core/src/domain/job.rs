//! Batch job aggregate and its read projections.
//!
//! All mutation goes through `BatchJob` methods so that item states, the
//! progress counters and the result/error lists move together. Callers hold
//! the job's mutex around each call; none of the methods suspend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::BatchId;
use super::item::BatchItem;
use super::options::{ItemInput, ResolvedOptions};
use super::progress::BatchProgress;
use super::state::{BatchState, ItemState};
use crate::error::BatchError;

/// Successful item outcome, appended in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub item_index: usize,
    pub item_id: String,
    pub result: serde_json::Value,
}

/// Terminal item failure, appended in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item_index: usize,
    pub item_id: String,
    pub message: String,
    pub attempts: u32,
}

/// Batch job record: the single source of truth for one batch.
///
/// Items are fixed at creation. Every mutation goes through a method so the
/// progress tally and item records move together under the caller's lock.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: BatchId,
    pub operation: String,
    pub options: ResolvedOptions,
    pub state: BatchState,
    pub items: Vec<BatchItem>,
    pub progress: BatchProgress,
    pub results: Vec<ItemResult>,
    pub errors: Vec<ItemFailure>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What the executor needs to run one item, copied out of the lock.
#[derive(Debug, Clone)]
pub struct ItemTicket {
    pub index: usize,
    pub id: String,
    pub data: serde_json::Value,
}

impl BatchJob {
    pub fn new(
        id: BatchId,
        operation: impl Into<String>,
        inputs: Vec<ItemInput>,
        options: ResolvedOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let items: Vec<BatchItem> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| BatchItem::new(index, input))
            .collect();
        Self {
            id,
            operation: operation.into(),
            options,
            state: BatchState::Pending,
            progress: BatchProgress::new(items.len()),
            items,
            results: Vec::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Pending -> Processing.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), BatchError> {
        if self.state != BatchState::Pending {
            return Err(BatchError::InvalidState {
                id: self.id,
                state: self.state,
                action: "start",
            });
        }
        self.state = BatchState::Processing;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Flip to `Cancelled` unless already terminal. Returns whether it flipped.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = BatchState::Cancelled;
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Move item `index` to processing, unless the batch is no longer
    /// processing (cancelled). The cancellation check and the transition
    /// happen under the same lock.
    pub fn begin_item(&mut self, index: usize, now: DateTime<Utc>) -> Option<ItemTicket> {
        if self.state != BatchState::Processing {
            return None;
        }
        let item = self.items.get_mut(index)?;
        if item.state != ItemState::Pending {
            return None;
        }
        item.mark_processing(now);
        self.progress.start_item();
        self.updated_at = now;
        Some(ItemTicket {
            index,
            id: item.id.clone(),
            data: item.data.clone(),
        })
    }

    /// Count one more attempt on item `index`.
    pub fn begin_attempt(&mut self, index: usize, now: DateTime<Utc>) -> u32 {
        self.updated_at = now;
        self.items
            .get_mut(index)
            .map(BatchItem::begin_attempt)
            .unwrap_or_default()
    }

    pub fn complete_item(
        &mut self,
        index: usize,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Option<ItemResult> {
        let item = self.items.get_mut(index)?;
        if item.state != ItemState::Processing {
            return None;
        }
        item.mark_completed(result.clone(), now);
        self.progress.complete_item();
        self.updated_at = now;
        let record = ItemResult {
            item_index: index,
            item_id: item.id.clone(),
            result,
        };
        self.results.push(record.clone());
        Some(record)
    }

    pub fn fail_item(
        &mut self,
        index: usize,
        message: String,
        now: DateTime<Utc>,
    ) -> Option<ItemFailure> {
        let item = self.items.get_mut(index)?;
        if item.state != ItemState::Processing {
            return None;
        }
        item.mark_failed(message.clone(), now);
        self.progress.fail_item();
        self.updated_at = now;
        let record = ItemFailure {
            item_index: index,
            item_id: item.id.clone(),
            message,
            attempts: item.attempts,
        };
        self.errors.push(record.clone());
        Some(record)
    }

    /// Close out the batch after the execution loop ends.
    ///
    /// A cancelled batch keeps its state; `completed_at` is re-stamped to when
    /// the last in-flight item settled. Otherwise the state follows the
    /// settled counts.
    pub fn finish(&mut self, now: DateTime<Utc>) -> BatchState {
        match self.state {
            BatchState::Cancelled => {
                self.completed_at = Some(now);
            }
            BatchState::Processing => {
                self.state = BatchState::settled(self.progress.completed, self.progress.failed);
                self.completed_at = Some(now);
            }
            _ => {}
        }
        self.updated_at = now;
        self.state
    }

    /// Time between start and completion (or `now` while running).
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.completed_at.unwrap_or(now);
        (end - started).to_std().unwrap_or_default()
    }

    pub fn progress_report(&self, now: DateTime<Utc>) -> ProgressReport {
        let elapsed = self.elapsed(now);
        ProgressReport {
            batch_id: self.id,
            state: self.state,
            progress: self.progress,
            elapsed: format_elapsed(elapsed),
            elapsed_ms: elapsed.as_millis() as u64,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.id,
            operation: self.operation.clone(),
            label: self.options.label.clone(),
            state: self.state,
            progress: self.progress,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    pub fn view(&self) -> BatchJobView {
        BatchJobView {
            batch_id: self.id,
            operation: self.operation.clone(),
            options: self.options.clone(),
            state: self.state,
            progress: self.progress,
            items: self.items.clone(),
            results: self.results.clone(),
            errors: self.errors.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Human-readable duration at millisecond precision, e.g. `1m 4s 250ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(millis).to_string()
}

/// Read-only progress projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub batch_id: BatchId,
    pub state: BatchState,
    pub progress: BatchProgress,
    pub elapsed: String,
    pub elapsed_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// List entry; carries no items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub state: BatchState,
    pub progress: BatchProgress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Full projection of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchJobView {
    pub batch_id: BatchId,
    pub operation: String,
    pub options: ResolvedOptions,
    pub state: BatchState,
    pub progress: BatchProgress,
    pub items: Vec<BatchItem>,
    pub results: Vec<ItemResult>,
    pub errors: Vec<ItemFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
