//! ItemExecutor - runs one item to a terminal outcome.
//!
//! Flow per item:
//! 1. pending -> processing (refused if the batch was cancelled)
//! 2. attempt; on failure wait `RetryPolicy::delay(attempt)` and retry
//! 3. processing -> completed | failed once it succeeds or the cap is hit
//!
//! Every transition updates the job under its lock first and publishes the
//! matching event after the lock is released.
//!
//! # Attempt budget
//! `max_attempts` counts the first attempt. With the defaults an item that
//! keeps failing is called three times and waits 2s and 4s in between; the
//! error kept on the item is the one from the last attempt. A per-attempt
//! deadline, when set, turns a stalled call into an ordinary failure that
//! consumes one attempt.
//!
//! # Cancellation
//! Checked once, in step 1, under the same lock that moves the item to
//! processing. After that the item is on its own: a cancel that arrives
//! mid-call or mid-backoff does not shorten the sleep or abort the call, and
//! the item still settles as completed or failed. Its `item_completed` /
//! `item_failed` event therefore follows the batch's `cancelled` event.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{BatchEvent, BatchId, ItemTicket, ResolvedOptions, RetryPolicy};
use crate::error::OperationError;
use crate::impls::{EventChannel, SharedJob};
use crate::ports::{Clock, ItemOperation};

/// Terminal result of [`ItemExecutor::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRun {
    Completed,
    Failed,
    /// The batch was no longer processing; the item was left untouched.
    Skipped,
}

pub struct ItemExecutor {
    batch_id: BatchId,
    job: SharedJob,
    operation: Arc<dyn ItemOperation>,
    events: EventChannel,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    max_attempts: u32,
    operation_timeout: Option<Duration>,
}

impl ItemExecutor {
    pub fn new(
        batch_id: BatchId,
        job: SharedJob,
        operation: Arc<dyn ItemOperation>,
        events: EventChannel,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        options: &ResolvedOptions,
    ) -> Self {
        Self {
            batch_id,
            job,
            operation,
            events,
            clock,
            retry,
            max_attempts: options.max_attempts.max(1),
            operation_timeout: options.operation_timeout,
        }
    }

    pub async fn execute(&self, index: usize) -> ItemRun {
        let ticket = {
            let mut job = self.job.lock().await;
            job.begin_item(index, self.clock.now())
        };
        let Some(ticket) = ticket else {
            return ItemRun::Skipped;
        };

        debug!(batch_id = %self.batch_id, index, item_id = %ticket.id, "item started");
        self.events.publish(BatchEvent::ItemStarted {
            batch_id: self.batch_id,
            index,
            item_id: ticket.id.clone(),
        });

        loop {
            let attempt = {
                let mut job = self.job.lock().await;
                job.begin_attempt(index, self.clock.now())
            };

            match self.attempt(&ticket).await {
                Ok(result) => {
                    self.complete(&ticket, attempt, result).await;
                    return ItemRun::Completed;
                }
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        batch_id = %self.batch_id,
                        index,
                        item_id = %ticket.id,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay = %humantime::format_duration(delay),
                        error = %err,
                        "item attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    self.fail(&ticket, err).await;
                    return ItemRun::Failed;
                }
            }
        }
    }

    async fn attempt(&self, ticket: &ItemTicket) -> Result<serde_json::Value, OperationError> {
        let call = self.operation.run(&ticket.id, &ticket.data);
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(OperationError::new(format!(
                    "operation timed out after {}",
                    humantime::format_duration(limit)
                )))
            }),
            None => call.await,
        }
    }

    async fn complete(&self, ticket: &ItemTicket, attempt: u32, result: serde_json::Value) {
        let (record, progress) = {
            let mut job = self.job.lock().await;
            let record = job.complete_item(ticket.index, result, self.clock.now());
            (record, job.progress)
        };
        let Some(record) = record else {
            return;
        };

        debug!(batch_id = %self.batch_id, index = ticket.index, attempt, "item completed");
        self.events.publish(BatchEvent::ItemCompleted {
            batch_id: self.batch_id,
            index: record.item_index,
            item_id: record.item_id,
            result: record.result,
        });
        self.events.publish(BatchEvent::Progress {
            batch_id: self.batch_id,
            progress,
        });
    }

    async fn fail(&self, ticket: &ItemTicket, err: OperationError) {
        let (record, progress) = {
            let mut job = self.job.lock().await;
            let record = job.fail_item(ticket.index, err.message().to_string(), self.clock.now());
            (record, job.progress)
        };
        let Some(record) = record else {
            return;
        };

        warn!(
            batch_id = %self.batch_id,
            index = ticket.index,
            item_id = %record.item_id,
            attempts = record.attempts,
            error = %record.message,
            "item failed permanently"
        );
        self.events.publish(BatchEvent::ItemFailed {
            batch_id: self.batch_id,
            index: record.item_index,
            item_id: record.item_id,
            error: record.message,
            attempts: record.attempts,
        });
        self.events.publish(BatchEvent::Progress {
            batch_id: self.batch_id,
            progress,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchJob, BatchState, ItemInput, ItemState};
    use crate::ports::{SystemClock, operation_fn};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;
    use ulid::Ulid;

    fn processing_job(ids: &[&str], max_attempts: u32) -> (SharedJob, ResolvedOptions) {
        let options = ResolvedOptions {
            max_attempts,
            operation_timeout: None,
            label: None,
        };
        let inputs = ids.iter().map(|id| ItemInput::from(*id)).collect();
        let now = chrono::Utc::now();
        let mut job = BatchJob::new(
            BatchId::from_ulid(Ulid::new()),
            "test",
            inputs,
            options.clone(),
            now,
        );
        job.start(now).unwrap();
        (Arc::new(Mutex::new(job)), options)
    }

    fn failing_until(successful_call: u32) -> (Arc<dyn ItemOperation>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = operation_fn(move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n >= successful_call {
                    Ok(serde_json::json!({ "call": n }))
                } else {
                    Err(OperationError::new(format!("call {n} failed")))
                }
            }
        });
        (op, calls)
    }

    fn executor(job: &SharedJob, options: &ResolvedOptions, op: Arc<dyn ItemOperation>) -> ItemExecutor {
        ItemExecutor::new(
            BatchId::from_ulid(Ulid::new()),
            Arc::clone(job),
            op,
            EventChannel::new(64),
            Arc::new(SystemClock),
            RetryPolicy::default(),
            options,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_does_not_retry() {
        let (job, options) = processing_job(&["a"], 3);
        let (op, calls) = failing_until(1);

        let run = executor(&job, &options, op).execute(0).await;

        assert_eq!(run, ItemRun::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let job = job.lock().await;
        assert_eq!(job.items[0].attempts, 1);
        assert_eq!(job.items[0].result, Some(serde_json::json!({ "call": 1 })));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_until_success() {
        let (job, options) = processing_job(&["a"], 3);
        let (op, calls) = failing_until(3);
        let started = tokio::time::Instant::now();

        let run = executor(&job, &options, op).execute(0).await;

        assert_eq!(run, ItemRun::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s after attempt 1, 4s after attempt 2
        assert_eq!(started.elapsed().as_secs(), 6);
        let job = job.lock().await;
        assert_eq!(job.items[0].state, ItemState::Completed);
        assert_eq!(job.items[0].attempts, 3);
        assert!(job.items[0].error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_cap_records_last_error() {
        let (job, options) = processing_job(&["a"], 3);
        let (op, calls) = failing_until(u32::MAX);

        let run = executor(&job, &options, op).execute(0).await;

        assert_eq!(run, ItemRun::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let job = job.lock().await;
        assert_eq!(job.items[0].attempts, 3);
        assert_eq!(job.items[0].error.as_deref(), Some("call 3 failed"));
        assert_eq!(job.errors[0].attempts, 3);
        assert!(job.progress.is_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_deadline_counts_as_failure() {
        let (job, mut options) = processing_job(&["a"], 2);
        options.operation_timeout = Some(Duration::from_secs(1));
        let op = operation_fn(|_, _| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, OperationError>(serde_json::json!(null))
        });

        let run = executor(&job, &options, op).execute(0).await;

        assert_eq!(run, ItemRun::Failed);
        let job = job.lock().await;
        assert_eq!(job.items[0].attempts, 2);
        assert_eq!(job.items[0].error.as_deref(), Some("operation timed out after 1s"));
    }

    #[tokio::test]
    async fn cancelled_batch_skips_the_item() {
        let (job, options) = processing_job(&["a"], 3);
        job.lock().await.cancel(chrono::Utc::now());
        let (op, calls) = failing_until(1);

        let run = executor(&job, &options, op).execute(0).await;

        assert_eq!(run, ItemRun::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let job = job.lock().await;
        assert_eq!(job.state, BatchState::Cancelled);
        assert_eq!(job.items[0].state, ItemState::Pending);
    }
}
