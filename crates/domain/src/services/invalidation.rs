//! Publisher side of the invalidation coordinator.

use std::sync::Arc;

use crate::error::PublishError;
use crate::models::InvalidationEvent;

/// Transport capable of broadcasting invalidation events to cache holders.
///
/// Delivery is best-effort and at-least-once to live subscribers, unordered
/// across independent subscribers. Implementations must not wait for or
/// verify subscriber receipt.
#[async_trait::async_trait]
pub trait InvalidationPublisher: Send + Sync {
    async fn publish(&self, event: InvalidationEvent) -> Result<(), PublishError>;
}

/// Publishes one event per committed write, after the write is durable.
///
/// A publish failure never fails the write that triggered it: the source of
/// truth has already committed, so the error is logged and swallowed and
/// caches self-heal via their entry expiry.
pub struct InvalidationCoordinator {
    publisher: Arc<dyn InvalidationPublisher>,
}

impl Clone for InvalidationCoordinator {
    fn clone(&self) -> Self {
        Self {
            publisher: self.publisher.clone(),
        }
    }
}

impl InvalidationCoordinator {
    pub fn new(publisher: Arc<dyn InvalidationPublisher>) -> Self {
        Self { publisher }
    }

    /// Publish an event, best-effort. Must be called only after the
    /// underlying store mutation has committed.
    pub async fn notify(&self, event: InvalidationEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            app_id = %event.app_id,
            env_id = ?event.env_id,
            identifier = ?event.identifier,
            "publishing invalidation event"
        );
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(
                error = %err,
                "failed to publish invalidation event; caches will refresh on expiry"
            );
        }
    }
}
