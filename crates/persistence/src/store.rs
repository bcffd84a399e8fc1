//! PostgreSQL-backed implementation of the domain `TemplateStore`.

use sqlx::PgPool;
use uuid::Uuid;

use domain::error::StoreError;
use domain::models::{OverrideRecord, TemplateSchema, TemplateType, UserOverrideRecord};
use domain::services::TemplateStore;

use crate::repositories::TemplateRepository;

/// Store adapter mapping between entities and domain models.
#[derive(Clone)]
pub struct PgTemplateStore {
    repository: TemplateRepository,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TemplateRepository::new(pool),
        }
    }

    fn encode_values(
        values: &std::collections::HashMap<String, serde_json::Value>,
    ) -> serde_json::Value {
        serde_json::Value::Object(
            values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl TemplateStore for PgTemplateStore {
    async fn get_schema(
        &self,
        application_id: Uuid,
        template_type: TemplateType,
    ) -> Result<Option<TemplateSchema>, StoreError> {
        let entity = self
            .repository
            .get_schema(application_id, template_type.into())
            .await?;
        entity.map(TemplateSchema::try_from).transpose()
    }

    async fn get_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<Option<OverrideRecord>, StoreError> {
        let entity = self
            .repository
            .get_override(
                application_id,
                environment_id,
                template_type.into(),
                identifier,
            )
            .await?;
        entity.map(OverrideRecord::try_from).transpose()
    }

    async fn get_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserOverrideRecord>, StoreError> {
        let entity = self
            .repository
            .get_user_override(application_id, environment_id, user_id)
            .await?;
        entity.map(UserOverrideRecord::try_from).transpose()
    }

    async fn put_schema(&self, schema: TemplateSchema) -> Result<(), StoreError> {
        let fields = serde_json::to_value(&schema.fields)
            .map_err(|e| StoreError::new(format!("unserializable schema fields: {e}")))?;
        self.repository
            .upsert_schema(schema.application_id, schema.template_type.into(), fields)
            .await?;
        Ok(())
    }

    async fn put_override(&self, record: OverrideRecord) -> Result<(), StoreError> {
        self.repository
            .upsert_override(
                record.application_id,
                record.environment_id,
                record.template_type.into(),
                &record.identifier,
                Self::encode_values(&record.values),
            )
            .await?;
        Ok(())
    }

    async fn delete_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .repository
            .delete_override(
                application_id,
                environment_id,
                template_type.into(),
                identifier,
            )
            .await?)
    }

    async fn put_user_override(&self, record: UserOverrideRecord) -> Result<(), StoreError> {
        self.repository
            .upsert_user_override(
                record.application_id,
                record.environment_id,
                record.user_id,
                Self::encode_values(&record.values),
            )
            .await?;
        Ok(())
    }

    async fn delete_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .repository
            .delete_user_override(application_id, environment_id, user_id)
            .await?)
    }
}
