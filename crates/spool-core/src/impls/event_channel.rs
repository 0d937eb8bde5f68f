//! In-process event channel.
//!
//! Fan-out over `tokio::sync::broadcast`: every receiver subscribed at
//! publish time gets events in publish order. No replay for late
//! subscribers; a receiver that falls more than `capacity` events behind
//! observes `RecvError::Lagged` and skips ahead.

use tokio::sync::broadcast;

use crate::domain::BatchEvent;

#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<BatchEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    /// Best-effort publish; returns how many subscribers received it.
    pub fn publish(&self, event: BatchEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BatchId;
    use ulid::Ulid;

    fn started(id: BatchId, total: usize) -> BatchEvent {
        BatchEvent::Started { batch_id: id, total }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let channel = EventChannel::new(8);
        let id = BatchId::from_ulid(Ulid::new());
        assert_eq!(channel.publish(started(id, 1)), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let channel = EventChannel::new(8);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        let id = BatchId::from_ulid(Ulid::new());

        assert_eq!(channel.publish(started(id, 1)), 2);
        channel.publish(started(id, 2));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap(), started(id, 1));
            assert_eq!(rx.recv().await.unwrap(), started(id, 2));
        }
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_history() {
        let channel = EventChannel::new(8);
        let id = BatchId::from_ulid(Ulid::new());
        let _early = channel.subscribe();
        channel.publish(started(id, 1));

        let mut late = channel.subscribe();
        channel.publish(started(id, 2));

        assert_eq!(late.recv().await.unwrap(), started(id, 2));
        assert!(late.try_recv().is_err());
    }
}
