//! Rolling progress counters of a batch.

use serde::{Deserialize, Serialize};

/// Progress tally.
///
/// `completed + failed + pending + processing == total` after every
/// transition; counters only move through the methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub processing: usize,
    pub percent_complete: u8,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            pending: total,
            processing: 0,
            percent_complete: 0,
        }
    }

    /// pending -> processing
    pub fn start_item(&mut self) {
        debug_assert!(self.pending > 0);
        self.pending = self.pending.saturating_sub(1);
        self.processing += 1;
    }

    /// processing -> completed
    pub fn complete_item(&mut self) {
        debug_assert!(self.processing > 0);
        self.processing = self.processing.saturating_sub(1);
        self.completed += 1;
        self.recompute_percent();
    }

    /// processing -> failed
    pub fn fail_item(&mut self) {
        debug_assert!(self.processing > 0);
        self.processing = self.processing.saturating_sub(1);
        self.failed += 1;
        self.recompute_percent();
    }

    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_consistent(&self) -> bool {
        self.completed + self.failed + self.pending + self.processing == self.total
    }

    // round(100 * settled / total), halves rounded up
    fn recompute_percent(&mut self) {
        self.percent_complete = if self.total == 0 {
            0
        } else {
            ((self.settled() * 200 + self.total) / (self.total * 2)).min(100) as u8
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn new_progress_is_all_pending() {
        let p = BatchProgress::new(4);
        assert_eq!(p.pending, 4);
        assert_eq!(p.percent_complete, 0);
        assert!(p.is_consistent());
    }

    #[test]
    fn transitions_keep_the_partition() {
        let mut p = BatchProgress::new(3);

        p.start_item();
        assert!(p.is_consistent());
        assert_eq!(p.processing, 1);

        p.complete_item();
        p.start_item();
        p.fail_item();
        assert!(p.is_consistent());
        assert_eq!((p.completed, p.failed, p.pending, p.processing), (1, 1, 1, 0));
    }

    #[rstest]
    #[case::one_of_three(3, 1, 33)]
    #[case::two_of_three(3, 2, 67)]
    #[case::half(2, 1, 50)]
    #[case::one_of_eight(8, 1, 13)]
    #[case::all(5, 5, 100)]
    fn percent_is_rounded(#[case] total: usize, #[case] settled: usize, #[case] expected: u8) {
        let mut p = BatchProgress::new(total);
        for _ in 0..settled {
            p.start_item();
            p.complete_item();
        }
        assert_eq!(p.percent_complete, expected);
    }
}
