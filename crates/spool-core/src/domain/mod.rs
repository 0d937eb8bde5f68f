//! Domain model: ids, states, items, batches, progress, events, retry policy.

pub mod events;
pub mod ids;
pub mod item;
pub mod job;
pub mod options;
pub mod progress;
pub mod retry;
pub mod state;

pub use events::{BatchEvent, BatchEventKind};
pub use ids::{BatchId, Id, IdMarker, ParseIdError};
pub use item::BatchItem;
pub use job::{
    BatchJob, BatchJobView, BatchSummary, ItemFailure, ItemResult, ItemTicket, ProgressReport,
    format_elapsed,
};
pub use options::{BatchOptions, ItemInput, ResolvedOptions};
pub use progress::BatchProgress;
pub use retry::RetryPolicy;
pub use state::{BatchState, ItemState};
