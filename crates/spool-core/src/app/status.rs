//! Status - aggregate counts over the stored batches.

use serde::{Deserialize, Serialize};

use crate::domain::BatchState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub partial: usize,
}

impl BatchCounts {
    pub fn record(&mut self, state: BatchState) {
        match state {
            BatchState::Pending => self.pending += 1,
            BatchState::Processing => self.processing += 1,
            BatchState::Completed => self.completed += 1,
            BatchState::Failed => self.failed += 1,
            BatchState::Cancelled => self.cancelled += 1,
            BatchState::Partial => self.partial += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed + self.cancelled + self.partial
    }
}

impl FromIterator<BatchState> for BatchCounts {
    fn from_iter<I: IntoIterator<Item = BatchState>>(iter: I) -> Self {
        let mut counts = BatchCounts::default();
        for state in iter {
            counts.record(state);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_state() {
        let counts: BatchCounts = [
            BatchState::Pending,
            BatchState::Completed,
            BatchState::Completed,
            BatchState::Partial,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.pending, 1);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.partial, 1);
        assert_eq!(counts.total(), 4);
    }
}
