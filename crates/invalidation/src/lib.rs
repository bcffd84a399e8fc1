//! Invalidation coordinator: broadcast transport, the read-side resolution
//! cache, and the listener that keeps the cache consistent with committed
//! writes.

pub mod bus;
pub mod cache;
pub mod listener;

pub use bus::InvalidationBus;
pub use cache::ResolutionCache;
pub use listener::InvalidationListener;
