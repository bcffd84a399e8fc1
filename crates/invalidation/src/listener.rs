//! Listener task that applies invalidation events to the local cache.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use domain::models::InvalidationEvent;

use crate::bus::InvalidationBus;
use crate::cache::ResolutionCache;

/// Consumes invalidation events and evicts subsumed cache entries.
///
/// Eviction happens synchronously on receipt, so an eviction for a key
/// happens-before any later population of that key observes the new data.
/// When the listener lags behind the bus it has missed events it cannot
/// reconstruct, so it clears the whole cache.
pub struct InvalidationListener {
    rx: broadcast::Receiver<InvalidationEvent>,
    cache: Arc<ResolutionCache>,
}

impl InvalidationListener {
    pub fn new(bus: &InvalidationBus, cache: Arc<ResolutionCache>) -> Self {
        Self {
            rx: bus.subscribe(),
            cache,
        }
    }

    /// Run until the bus is closed.
    pub async fn run(mut self) {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    let evicted = self.cache.evict_scope(&event).await;
                    tracing::debug!(
                        event_type = %event.event_type,
                        app_id = %event.app_id,
                        evicted,
                        "applied invalidation event"
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        missed,
                        "invalidation listener lagged behind the bus; clearing resolution cache"
                    );
                    self.cache.clear().await;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("invalidation bus closed; stopping listener");
                    break;
                }
            }
        }
    }
}
