//! BatchScheduler - create / start / query / cancel / delete batches.
//!
//! One spawned task per started batch drives its items strictly in
//! submission order through an [`ItemExecutor`]. Batches run independently;
//! there is no scheduler-wide lock held while an item executes.
//!
//! # Lifecycle
//! 1. `create`: validate, allocate an id, store the job as `pending`
//! 2. `start`: `pending -> processing` inside [`BatchStore::update`], publish
//!    `started`, spawn the driver
//! 3. driver: items 0..N through the executor, stopping at the first item the
//!    executor skips because the batch was cancelled
//! 4. driver: `finish` settles `completed` / `failed` / `partial` from the
//!    counters, or leaves `cancelled` alone, then publishes `completed`
//!    unless cancelled
//!
//! # Event order per batch
//! `started`, then per item `item_started`, `item_completed` or
//! `item_failed`, `progress`, and finally `completed`. A cancel publishes
//! `cancelled` from the caller's task at the moment it flips the state; the
//! in-flight item's events come after it and no `completed` follows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use super::builder::{BuildError, SchedulerBuilder};
use super::executor::{ItemExecutor, ItemRun};
use super::status::BatchCounts;
use crate::config::SchedulerConfig;
use crate::domain::{
    BatchEvent, BatchId, BatchJob, BatchJobView, BatchOptions, BatchState, BatchSummary,
    ItemInput, ProgressReport,
};
use crate::error::BatchError;
use crate::impls::{BatchStore, EventChannel, OperationRegistry, SharedJob};
use crate::ports::{Clock, IdGenerator, ItemOperation};

pub(crate) struct SchedulerParts {
    pub config: SchedulerConfig,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub registry: OperationRegistry,
}

struct Inner {
    config: SchedulerConfig,
    store: BatchStore,
    events: EventChannel,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registry: OperationRegistry,
}

/// Cheap to clone; clones share the same store and event channel.
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<Inner>,
}

/// Handle to a started batch.
///
/// Dropping it detaches the batch; it keeps running.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: BatchId,
    join: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the batch to reach its final state.
    pub async fn wait(self) -> Result<BatchSummary, BatchError> {
        self.join.await.map_err(|err| BatchError::Aborted {
            id: self.batch_id,
            reason: err.to_string(),
        })
    }
}

impl BatchScheduler {
    /// Scheduler with no registered operations. Fails on an invalid config.
    pub fn new(config: SchedulerConfig) -> Result<Self, BuildError> {
        SchedulerBuilder::new().config(config).build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_parts(parts: SchedulerParts) -> Self {
        let events = EventChannel::new(parts.config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config: parts.config,
                store: BatchStore::new(),
                events,
                clock: parts.clock,
                ids: parts.ids,
                registry: parts.registry,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.inner.registry
    }

    pub fn events(&self) -> &EventChannel {
        &self.inner.events
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.inner.events.subscribe()
    }

    /// Create a batch in `Pending` state. Nothing runs until it is started.
    pub async fn create<I>(
        &self,
        items: I,
        operation: &str,
        options: BatchOptions,
    ) -> Result<BatchJobView, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<ItemInput>,
    {
        if operation.trim().is_empty() {
            return Err(BatchError::InvalidArgument(
                "operation name must not be empty".to_string(),
            ));
        }
        let registry = &self.inner.registry;
        if !registry.is_empty() && !registry.contains(operation) {
            return Err(BatchError::UnknownOperation(operation.to_string()));
        }

        let items: Vec<ItemInput> = items.into_iter().map(Into::into).collect();
        let options = self.inner.config.resolve(items.len(), options)?;

        let id = self.inner.ids.generate_batch_id();
        let job = BatchJob::new(id, operation, items, options, self.inner.clock.now());
        let view = job.view();
        self.inner.store.insert(job).await;

        info!(
            batch_id = %id,
            operation,
            items = view.progress.total,
            max_attempts = view.options.max_attempts,
            "batch created"
        );
        Ok(view)
    }

    /// Start a pending batch with `operation` and return immediately.
    pub async fn start(
        &self,
        id: BatchId,
        operation: Arc<dyn ItemOperation>,
    ) -> Result<BatchHandle, BatchError> {
        let now = self.inner.clock.now();
        let (shared, total) = self
            .inner
            .store
            .update(id, |job| {
                job.start(now)?;
                Ok(job.progress.total)
            })
            .await?;

        info!(batch_id = %id, total, "batch started");
        self.inner.events.publish(BatchEvent::Started {
            batch_id: id,
            total,
        });

        let scheduler = self.clone();
        let join = tokio::spawn(async move { scheduler.drive(id, shared, operation).await });
        Ok(BatchHandle { batch_id: id, join })
    }

    /// Start a pending batch with the operation registered under its name.
    pub async fn start_registered(&self, id: BatchId) -> Result<BatchHandle, BatchError> {
        let shared = self.inner.store.require(id).await?;
        let name = shared.lock().await.operation.clone();
        let operation = self.inner.registry.resolve(&name)?;
        self.start(id, operation).await
    }

    /// Create and start in one go.
    pub async fn submit<I>(
        &self,
        items: I,
        operation_name: &str,
        options: BatchOptions,
        operation: Arc<dyn ItemOperation>,
    ) -> Result<(BatchJobView, BatchHandle), BatchError>
    where
        I: IntoIterator,
        I::Item: Into<ItemInput>,
    {
        let view = self.create(items, operation_name, options).await?;
        let handle = self.start(view.batch_id, operation).await?;
        Ok((view, handle))
    }

    /// Start and wait for the final state.
    pub async fn run(
        &self,
        id: BatchId,
        operation: Arc<dyn ItemOperation>,
    ) -> Result<BatchSummary, BatchError> {
        self.start(id, operation).await?.wait().await
    }

    async fn drive(
        &self,
        id: BatchId,
        shared: SharedJob,
        operation: Arc<dyn ItemOperation>,
    ) -> BatchSummary {
        let (total, options) = {
            let job = shared.lock().await;
            (job.items.len(), job.options.clone())
        };
        let executor = ItemExecutor::new(
            id,
            Arc::clone(&shared),
            operation,
            self.inner.events.clone(),
            Arc::clone(&self.inner.clock),
            self.inner.config.backoff.clone(),
            &options,
        );

        for index in 0..total {
            if executor.execute(index).await == ItemRun::Skipped {
                break;
            }
        }

        let (state, summary) = {
            let mut job = shared.lock().await;
            let state = job.finish(self.inner.clock.now());
            (state, job.summary())
        };

        if state == BatchState::Cancelled {
            info!(
                batch_id = %id,
                completed = summary.progress.completed,
                failed = summary.progress.failed,
                pending = summary.progress.pending,
                "batch stopped after cancellation"
            );
        } else {
            info!(
                batch_id = %id,
                %state,
                completed = summary.progress.completed,
                failed = summary.progress.failed,
                "batch finished"
            );
            self.inner.events.publish(BatchEvent::Completed {
                batch_id: id,
                state,
                progress: summary.progress,
            });
        }
        summary
    }

    pub async fn get_progress(&self, id: BatchId) -> Result<ProgressReport, BatchError> {
        let shared = self.inner.store.require(id).await?;
        let job = shared.lock().await;
        Ok(job.progress_report(self.inner.clock.now()))
    }

    pub async fn get_job(&self, id: BatchId) -> Result<BatchJobView, BatchError> {
        let shared = self.inner.store.require(id).await?;
        let job = shared.lock().await;
        Ok(job.view())
    }

    /// Request cancellation.
    ///
    /// Returns `false` if the batch already reached a terminal state. An item
    /// in flight finishes first; items after it stay pending.
    pub async fn cancel(&self, id: BatchId) -> Result<bool, BatchError> {
        let now = self.inner.clock.now();
        let (_, (cancelled, previous, progress)) = self
            .inner
            .store
            .update(id, |job| {
                let previous = job.state;
                Ok((job.cancel(now), previous, job.progress))
            })
            .await?;
        if cancelled {
            info!(batch_id = %id, from = %previous, "batch cancelled");
            self.inner.events.publish(BatchEvent::Cancelled {
                batch_id: id,
                progress,
            });
        }
        Ok(cancelled)
    }

    /// Summaries sorted newest first, optionally filtered by state.
    pub async fn list(&self, state: Option<BatchState>, limit: usize) -> Vec<BatchSummary> {
        let mut summaries = Vec::new();
        for shared in self.inner.store.all().await {
            let job = shared.lock().await;
            if state.is_none_or(|wanted| job.state == wanted) {
                summaries.push(job.summary());
            }
        }
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.batch_id.cmp(&a.batch_id))
        });
        summaries.truncate(limit);
        summaries
    }

    /// Remove a batch. Refused while it is processing.
    pub async fn delete(&self, id: BatchId) -> Result<(), BatchError> {
        self.inner
            .store
            .remove_if(id, |job| {
                if job.state == BatchState::Processing {
                    Err(BatchError::InvalidState {
                        id,
                        state: job.state,
                        action: "delete",
                    })
                } else {
                    Ok(())
                }
            })
            .await?;
        info!(batch_id = %id, "batch deleted");
        Ok(())
    }

    /// Drop terminal batches that completed more than `older_than` ago.
    pub async fn prune(&self, older_than: Duration) -> usize {
        let delta = chrono::TimeDelta::from_std(older_than).unwrap_or(chrono::TimeDelta::MAX);
        let cutoff = self
            .inner
            .clock
            .now()
            .checked_sub_signed(delta)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let pruned = self.inner.store.prune_completed_before(cutoff).await;
        if !pruned.is_empty() {
            info!(count = pruned.len(), "pruned finished batches");
        }
        pruned.len()
    }

    pub async fn stats(&self) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for shared in self.inner.store.all().await {
            counts.record(shared.lock().await.state);
        }
        counts
    }
}
