//! Template entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::error::StoreError;
use domain::models::{
    FieldDefinition, OverrideRecord, TemplateSchema, TemplateType, UserOverrideRecord,
};

/// Database enum for template_type that maps to the PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "template_type", rename_all = "UPPERCASE")]
pub enum TemplateTypeDb {
    System,
    User,
}

impl From<TemplateType> for TemplateTypeDb {
    fn from(value: TemplateType) -> Self {
        match value {
            TemplateType::System => TemplateTypeDb::System,
            TemplateType::User => TemplateTypeDb::User,
        }
    }
}

impl From<TemplateTypeDb> for TemplateType {
    fn from(value: TemplateTypeDb) -> Self {
        match value {
            TemplateTypeDb::System => TemplateType::System,
            TemplateTypeDb::User => TemplateType::User,
        }
    }
}

/// Database row mapping for the template_schemas table.
///
/// Field definitions are stored as a JSONB array.
#[derive(Debug, Clone, FromRow)]
pub struct TemplateSchemaEntity {
    pub application_id: Uuid,
    pub template_type: TemplateTypeDb,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateSchemaEntity> for TemplateSchema {
    type Error = StoreError;

    fn try_from(entity: TemplateSchemaEntity) -> Result<Self, Self::Error> {
        let fields: Vec<FieldDefinition> = serde_json::from_value(entity.fields)
            .map_err(|e| StoreError::new(format!("malformed schema fields: {e}")))?;
        Ok(Self {
            application_id: entity.application_id,
            template_type: entity.template_type.into(),
            fields,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the template_overrides table.
#[derive(Debug, Clone, FromRow)]
pub struct OverrideEntity {
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub template_type: TemplateTypeDb,
    pub identifier: String,
    pub values: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OverrideEntity> for OverrideRecord {
    type Error = StoreError;

    fn try_from(entity: OverrideEntity) -> Result<Self, Self::Error> {
        let values = serde_json::from_value(entity.values)
            .map_err(|e| StoreError::new(format!("malformed override values: {e}")))?;
        Ok(Self {
            application_id: entity.application_id,
            environment_id: entity.environment_id,
            template_type: entity.template_type.into(),
            identifier: entity.identifier,
            values,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the user_template_overrides table.
#[derive(Debug, Clone, FromRow)]
pub struct UserOverrideEntity {
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub user_id: Uuid,
    pub values: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserOverrideEntity> for UserOverrideRecord {
    type Error = StoreError;

    fn try_from(entity: UserOverrideEntity) -> Result<Self, Self::Error> {
        let values = serde_json::from_value(entity.values)
            .map_err(|e| StoreError::new(format!("malformed user override values: {e}")))?;
        Ok(Self {
            application_id: entity.application_id,
            environment_id: entity.environment_id,
            user_id: entity.user_id,
            values,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_type_mapping() {
        assert_eq!(
            TemplateType::from(TemplateTypeDb::from(TemplateType::System)),
            TemplateType::System
        );
        assert_eq!(
            TemplateType::from(TemplateTypeDb::from(TemplateType::User)),
            TemplateType::User
        );
    }

    #[test]
    fn test_schema_entity_conversion() {
        let entity = TemplateSchemaEntity {
            application_id: Uuid::new_v4(),
            template_type: TemplateTypeDb::System,
            fields: json!([
                {"key": "retries", "fieldType": "integer", "defaultValue": 3}
            ]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let schema = TemplateSchema::try_from(entity).unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].key, "retries");
        assert_eq!(schema.fields[0].default_value, json!(3));
    }

    #[test]
    fn test_schema_entity_conversion_rejects_malformed_fields() {
        let entity = TemplateSchemaEntity {
            application_id: Uuid::new_v4(),
            template_type: TemplateTypeDb::System,
            fields: json!({"not": "an array"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(TemplateSchema::try_from(entity).is_err());
    }

    #[test]
    fn test_override_entity_conversion() {
        let entity = OverrideEntity {
            application_id: Uuid::new_v4(),
            environment_id: Uuid::new_v4(),
            template_type: TemplateTypeDb::System,
            identifier: "payments".to_string(),
            values: json!({"timeout": 60}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let record = OverrideRecord::try_from(entity).unwrap();
        assert_eq!(record.identifier, "payments");
        assert_eq!(record.values.get("timeout"), Some(&json!(60)));
    }
}
