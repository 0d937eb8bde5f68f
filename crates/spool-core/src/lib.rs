//! spool-core
//!
//! In-process batch job scheduler: accepts a list of items plus an
//! operation, runs the operation over every item in order with retry and
//! exponential backoff, and exposes progress, cancellation and lifecycle
//! events while the batch runs.
//!
//! # Modules
//! - **domain**: ids, states, items, batches, progress, events, retry policy
//! - **ports**: Clock, IdGenerator, ItemOperation
//! - **impls**: in-memory store, event channel, operation registry
//! - **app**: builder, scheduler, item executor, status counts
//! - **config**: scheduler limits and defaults
//! - **error**: BatchError / OperationError

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{BatchCounts, BatchHandle, BatchScheduler, BuildError, SchedulerBuilder};
pub use config::SchedulerConfig;
pub use domain::{
    BatchEvent, BatchEventKind, BatchId, BatchJobView, BatchOptions, BatchProgress, BatchState,
    BatchSummary, ItemInput, ItemState, ProgressReport, RetryPolicy,
};
pub use error::{BatchError, OperationError};
pub use ports::{Clock, ItemOperation, operation_fn};
