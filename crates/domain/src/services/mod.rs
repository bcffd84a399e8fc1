//! Domain services for the template core.
//!
//! Services contain the resolution algorithm, the store abstraction, and
//! the publisher side of the invalidation coordinator.

pub mod invalidation;
pub mod resolution;
pub mod store;

pub use invalidation::{InvalidationCoordinator, InvalidationPublisher};
pub use resolution::{
    merge_effective_values, ResolveRequest, ResolvedTemplate, TemplateResolver, ValueSource,
};
pub use store::{InMemoryTemplateStore, TemplateStore};
