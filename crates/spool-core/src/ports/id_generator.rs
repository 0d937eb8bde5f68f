//! IdGenerator port.
//!
//! IDs are ULIDs whose timestamp part comes from the injected [`Clock`], so a
//! pinned clock yields IDs with a known timestamp and random tail.

use ulid::Ulid;

use crate::domain::BatchId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_batch_id(&self) -> BatchId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_batch_id(&self) -> BatchId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        BatchId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);
        let a = id_gen.generate_batch_id();
        let b = id_gen.generate_batch_id();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("batch-"));
    }

    #[test]
    fn timestamp_part_follows_the_clock() {
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed));

        let a = id_gen.generate_batch_id();
        let b = id_gen.generate_batch_id();

        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), fixed.timestamp_millis() as u64);
        assert_eq!(b.as_ulid().timestamp_ms(), fixed.timestamp_millis() as u64);
    }
}
