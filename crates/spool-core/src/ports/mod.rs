//! Ports: the seams between the scheduler and its collaborators.
//!
//! - **Clock**: wall-clock time for timestamps
//! - **IdGenerator**: batch identifiers
//! - **ItemOperation**: the caller-supplied per-item work

pub mod clock;
pub mod id_generator;
pub mod operation;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::operation::{FnOperation, ItemOperation, operation_fn};
