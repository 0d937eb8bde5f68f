//! In-process implementations used by the scheduler.
//!
//! - **BatchStore**: mutex-guarded job map, process memory only
//! - **EventChannel**: broadcast fan-out of lifecycle events
//! - **OperationRegistry**: named item operations

pub mod event_channel;
pub mod memory_store;
pub mod registry;

pub use self::event_channel::EventChannel;
pub use self::memory_store::{BatchStore, SharedJob};
pub use self::registry::OperationRegistry;
