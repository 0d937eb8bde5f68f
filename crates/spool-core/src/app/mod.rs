//! App - the scheduler surface built on the ports.
//!
//! # Components
//! - **SchedulerBuilder**: wiring and startup validation
//! - **BatchScheduler**: create / start / progress / cancel / list / delete
//! - **ItemExecutor**: one item through its retry loop
//! - **BatchCounts**: per-state totals

pub mod builder;
pub mod executor;
pub mod scheduler;
pub mod status;

pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::executor::{ItemExecutor, ItemRun};
pub use self::scheduler::{BatchHandle, BatchScheduler};
pub use self::status::BatchCounts;
