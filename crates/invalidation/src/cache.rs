//! Local cache of resolved template values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use domain::models::{InvalidationEvent, ResolutionKey};
use domain::services::ResolvedTemplate;

struct CachedEntry {
    resolved: ResolvedTemplate,
    cached_at: Instant,
}

/// Cache of resolution results keyed by the composite resolution key.
///
/// Eviction happens synchronously when the listener receives an invalidation
/// event. The per-entry maximum lifetime is a safety net for the bounded
/// staleness window left by a lost publish, not the primary freshness
/// mechanism.
///
/// Population is generation-guarded: every invalidation advances a counter,
/// and `insert_if_current` declines when invalidation has run since the
/// caller snapshotted the generation. A resolution that read the store
/// before a write committed can therefore never re-populate the cache after
/// that write's event has been applied.
pub struct ResolutionCache {
    entries: RwLock<HashMap<ResolutionKey, CachedEntry>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Current invalidation generation. Snapshot this before reading the
    /// store, then pass it to `insert_if_current`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Get a cached result, if present and not past its maximum lifetime.
    pub async fn get(&self, key: &ResolutionKey) -> Option<ResolvedTemplate> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.cached_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.resolved.clone())
    }

    pub async fn insert(&self, key: ResolutionKey, resolved: ResolvedTemplate) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CachedEntry {
                resolved,
                cached_at: Instant::now(),
            },
        );
    }

    /// Insert a result computed from store state read at `generation`.
    ///
    /// Returns false without inserting when invalidation has advanced since
    /// the snapshot: the result may predate a committed write whose eviction
    /// already ran, and caching it would resurrect the pre-write value.
    pub async fn insert_if_current(
        &self,
        key: ResolutionKey,
        resolved: ResolvedTemplate,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        entries.insert(
            key,
            CachedEntry {
                resolved,
                cached_at: Instant::now(),
            },
        );
        true
    }

    /// Evict every entry whose key the event's scope subsumes.
    /// Returns the number of entries removed.
    ///
    /// Advances the generation even when nothing matched: an in-flight
    /// resolution for a subsumed key may not have populated its entry yet.
    pub async fn evict_scope(&self, event: &InvalidationEvent) -> usize {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::Release);
        let before = entries.len();
        entries.retain(|key, _| !event.subsumes(key));
        before - entries.len()
    }

    /// Drop every entry. Used as the coarsest conservative eviction when
    /// events may have been missed.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::Release);
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
