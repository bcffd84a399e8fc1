//! Template domain models for schema-defined configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Kind of template a schema or override belongs to.
///
/// `System` templates configure integrations and features and are addressed
/// by a free-form identifier; `User` templates hold per-end-user configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    System,
    User,
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateType::System => write!(f, "SYSTEM"),
            TemplateType::User => write!(f, "USER"),
        }
    }
}

/// Data type for schema field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Integer,
    String,
    Float,
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::String => write!(f, "string"),
            FieldType::Float => write!(f, "float"),
            FieldType::Json => write!(f, "json"),
        }
    }
}

/// A recognized field in a template schema with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: String,
    pub field_type: FieldType,
    pub default_value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The schema for one (application, template type) pair.
///
/// Defines the authoritative field set and the defaults every resolution
/// starts from. At most one schema exists per (application, type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSchema {
    pub application_id: Uuid,
    pub template_type: TemplateType,
    pub fields: Vec<FieldDefinition>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateSchema {
    /// Default values for every field the schema defines.
    pub fn default_values(&self) -> HashMap<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.default_value.clone()))
            .collect()
    }

    /// Whether the schema defines a field with the given key.
    pub fn recognizes(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }

    /// Look up a field definition by key.
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// Environment-scoped override values for one identifier.
///
/// At most one record exists per (application, environment, type, identifier).
/// The value map is partial: fields it omits keep their lower-precedence
/// values during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub template_type: TemplateType,
    pub identifier: String,
    pub values: HashMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user override values, applied only when resolving `USER` templates
/// for that user. Takes precedence over any environment-scoped override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverrideRecord {
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub user_id: Uuid,
    pub values: HashMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a single schema field in a schema update request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinitionInput {
    #[validate(length(min = 1, max = 128, message = "Field key must be 1-128 characters"))]
    pub key: String,
    pub field_type: FieldType,
    pub default_value: serde_json::Value,
    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: Option<String>,
}

impl From<FieldDefinitionInput> for FieldDefinition {
    fn from(input: FieldDefinitionInput) -> Self {
        Self {
            key: input.key,
            field_type: input.field_type,
            default_value: input.default_value,
            description: input.description,
        }
    }
}

/// Request payload for replacing the schema of an (application, type) pair.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpdate {
    #[validate(length(min = 1, message = "Schema must define at least one field"))]
    #[validate(nested)]
    pub fields: Vec<FieldDefinitionInput>,
}

impl SchemaUpdate {
    /// Returns the first duplicated field key, if any.
    pub fn duplicate_key(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .find(|f| !seen.insert(f.key.as_str()))
            .map(|f| f.key.as_str())
    }
}

/// Request payload for creating or replacing an environment-scoped override.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OverrideWrite {
    #[validate(length(min = 1, message = "Override must set at least one field"))]
    pub values: HashMap<String, serde_json::Value>,
}

/// Request payload for creating or replacing a user-scoped override.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserOverrideWrite {
    #[validate(length(min = 1, message = "Override must set at least one field"))]
    pub values: HashMap<String, serde_json::Value>,
}
