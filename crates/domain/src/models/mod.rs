//! Domain models for the template service.

pub mod context;
pub mod invalidation;
pub mod template;

pub use context::AccessScope;
pub use invalidation::{
    InvalidationEvent, InvalidationType, ResolutionKey, INVALIDATION_CHANNEL,
};
pub use template::{
    FieldDefinition, FieldDefinitionInput, FieldType, OverrideRecord, OverrideWrite, SchemaUpdate,
    TemplateSchema, TemplateType, UserOverrideRecord, UserOverrideWrite,
};
