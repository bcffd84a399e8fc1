//! Template store abstraction and in-memory implementation.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{OverrideRecord, TemplateSchema, TemplateType, UserOverrideRecord};

/// Backing store for schemas and override records.
///
/// The read path needs only the three point lookups; the write methods are
/// used by the write path, which publishes an invalidation event after each
/// committed mutation. Implementations must apply writes to a single record
/// atomically so a concurrent lookup never observes a half-applied write.
#[async_trait::async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_schema(
        &self,
        application_id: Uuid,
        template_type: TemplateType,
    ) -> Result<Option<TemplateSchema>, StoreError>;

    async fn get_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<Option<OverrideRecord>, StoreError>;

    async fn get_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserOverrideRecord>, StoreError>;

    async fn put_schema(&self, schema: TemplateSchema) -> Result<(), StoreError>;

    async fn put_override(&self, record: OverrideRecord) -> Result<(), StoreError>;

    /// Returns true if a record existed and was deleted.
    async fn delete_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<bool, StoreError>;

    async fn put_user_override(&self, record: UserOverrideRecord) -> Result<(), StoreError>;

    /// Returns true if a record existed and was deleted.
    async fn delete_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError>;
}

type SchemaKey = (Uuid, TemplateType);
type OverrideKey = (Uuid, Uuid, TemplateType, String);
type UserOverrideKey = (Uuid, Uuid, Uuid);

/// In-memory store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    schemas: RwLock<HashMap<SchemaKey, TemplateSchema>>,
    overrides: RwLock<HashMap<OverrideKey, OverrideRecord>>,
    user_overrides: RwLock<HashMap<UserOverrideKey, UserOverrideRecord>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get_schema(
        &self,
        application_id: Uuid,
        template_type: TemplateType,
    ) -> Result<Option<TemplateSchema>, StoreError> {
        let schemas = self.schemas.read().await;
        Ok(schemas.get(&(application_id, template_type)).cloned())
    }

    async fn get_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<Option<OverrideRecord>, StoreError> {
        let overrides = self.overrides.read().await;
        let key = (
            application_id,
            environment_id,
            template_type,
            identifier.to_string(),
        );
        Ok(overrides.get(&key).cloned())
    }

    async fn get_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserOverrideRecord>, StoreError> {
        let user_overrides = self.user_overrides.read().await;
        Ok(user_overrides
            .get(&(application_id, environment_id, user_id))
            .cloned())
    }

    async fn put_schema(&self, schema: TemplateSchema) -> Result<(), StoreError> {
        let mut schemas = self.schemas.write().await;
        schemas.insert((schema.application_id, schema.template_type), schema);
        Ok(())
    }

    async fn put_override(&self, record: OverrideRecord) -> Result<(), StoreError> {
        let mut overrides = self.overrides.write().await;
        let key = (
            record.application_id,
            record.environment_id,
            record.template_type,
            record.identifier.clone(),
        );
        overrides.insert(key, record);
        Ok(())
    }

    async fn delete_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<bool, StoreError> {
        let mut overrides = self.overrides.write().await;
        let key = (
            application_id,
            environment_id,
            template_type,
            identifier.to_string(),
        );
        Ok(overrides.remove(&key).is_some())
    }

    async fn put_user_override(&self, record: UserOverrideRecord) -> Result<(), StoreError> {
        let mut user_overrides = self.user_overrides.write().await;
        let key = (
            record.application_id,
            record.environment_id,
            record.user_id,
        );
        user_overrides.insert(key, record);
        Ok(())
    }

    async fn delete_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut user_overrides = self.user_overrides.write().await;
        Ok(user_overrides
            .remove(&(application_id, environment_id, user_id))
            .is_some())
    }
}
