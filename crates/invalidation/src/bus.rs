//! In-process broadcast transport for invalidation events.

use tokio::sync::broadcast;

use domain::error::PublishError;
use domain::models::{InvalidationEvent, INVALIDATION_CHANNEL};
use domain::services::InvalidationPublisher;

/// Broadcast bus carrying invalidation events to any number of subscribers.
///
/// Uses `tokio::sync::broadcast` with a configurable buffer size. Each
/// subscriber gets an independent stream; a slow subscriber that falls more
/// than the buffer behind observes a lag error instead of blocking
/// publishers. Events from one publisher are delivered in publish order.
pub struct InvalidationBus {
    tx: broadcast::Sender<InvalidationEvent>,
}

impl InvalidationBus {
    /// Create a bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to receive events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait::async_trait]
impl InvalidationPublisher for InvalidationBus {
    async fn publish(&self, event: InvalidationEvent) -> Result<(), PublishError> {
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            channel = INVALIDATION_CHANNEL,
            event_type = %event.event_type,
            app_id = %event.app_id,
            subscriber_count,
            "broadcasting invalidation event"
        );
        // With no subscribers there is nothing to invalidate; the event is
        // dropped rather than treated as a failure.
        let _ = self.tx.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::TemplateType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = InvalidationBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = InvalidationEvent::schema_change(Uuid::new_v4(), TemplateType::System);
        bus.publish(event.clone()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InvalidationBus::new(32);
        let event = InvalidationEvent::schema_change(Uuid::new_v4(), TemplateType::User);
        assert!(bus.publish(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_per_publisher_ordering() {
        let bus = InvalidationBus::new(32);
        let mut rx = bus.subscribe();
        let app = Uuid::new_v4();
        let env = Uuid::new_v4();

        let first = InvalidationEvent::override_change(app, env, TemplateType::System, "a");
        let second = InvalidationEvent::override_change(app, env, TemplateType::System, "b");
        bus.publish(first.clone()).await.unwrap();
        bus.publish(second.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }
}
