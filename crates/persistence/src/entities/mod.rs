//! Entity definitions (database row mappings).

pub mod template;

pub use template::{
    OverrideEntity, TemplateSchemaEntity, TemplateTypeDb, UserOverrideEntity,
};
