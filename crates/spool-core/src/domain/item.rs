//! Per-item record owned by its batch.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::options::ItemInput;
use super::state::ItemState;

/// One item of a batch.
///
/// `result` and `error` stay `None` until the item settles; exactly one of
/// them is set afterwards. All transitions go through the methods below.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    /// Position in the submitted sequence; never renumbered.
    pub index: usize,
    pub id: String,
    pub data: serde_json::Value,
    pub state: ItemState,
    pub attempts: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchItem {
    pub fn new(index: usize, input: ItemInput) -> Self {
        Self {
            index,
            id: input.id,
            data: input.data,
            state: ItemState::Pending,
            attempts: 0,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Pending -> Processing. `started_at` is stamped once.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.state = ItemState::Processing;
        self.started_at.get_or_insert(now);
    }

    /// Count one more attempt; returns the new attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn mark_completed(&mut self, result: serde_json::Value, now: DateTime<Utc>) {
        self.state = ItemState::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(now);
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.state = ItemState::Failed;
        self.error = Some(error);
        self.result = None;
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn new_item_is_pending_and_empty() {
        let item = BatchItem::new(2, ItemInput::from("s-1"));
        assert_eq!(item.index, 2);
        assert_eq!(item.state, ItemState::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.result.is_none() && item.error.is_none());
        assert!(item.started_at.is_none());
    }

    #[test]
    fn started_at_is_stamped_once() {
        let mut item = BatchItem::new(0, ItemInput::from("s-1"));
        item.mark_processing(at(10));
        item.mark_processing(at(20));
        assert_eq!(item.started_at, Some(at(10)));
    }

    #[test]
    fn terminal_outcomes_are_mutually_exclusive() {
        let mut ok = BatchItem::new(0, ItemInput::from("a"));
        ok.mark_processing(at(1));
        ok.begin_attempt();
        ok.mark_completed(serde_json::json!({"ok": true}), at(2));
        assert_eq!(ok.state, ItemState::Completed);
        assert!(ok.result.is_some() && ok.error.is_none());

        let mut bad = BatchItem::new(1, ItemInput::from("b"));
        bad.mark_processing(at(1));
        bad.begin_attempt();
        bad.begin_attempt();
        bad.mark_failed("boom".to_string(), at(3));
        assert_eq!(bad.state, ItemState::Failed);
        assert_eq!(bad.attempts, 2);
        assert!(bad.result.is_none());
        assert_eq!(bad.error.as_deref(), Some("boom"));
        assert_eq!(bad.completed_at, Some(at(3)));
    }
}
