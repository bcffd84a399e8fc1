//! Template write operations and the cached read path.
//!
//! Every write commits to the store first and publishes its invalidation
//! event afterwards. Publishing is best-effort: a transport failure leaves
//! the committed write intact and is never surfaced to the caller.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use domain::error::{ResolveError, TemplateWriteError};
use domain::models::{
    AccessScope, InvalidationEvent, OverrideRecord, OverrideWrite, SchemaUpdate, TemplateSchema,
    TemplateType, UserOverrideRecord, UserOverrideWrite,
};
use domain::services::{
    InvalidationCoordinator, ResolveRequest, ResolvedTemplate, TemplateResolver, TemplateStore,
};
use invalidation::ResolutionCache;

/// Facade over the resolver, cache, store, and invalidation coordinator.
pub struct TemplateService<S> {
    store: Arc<S>,
    resolver: TemplateResolver<S>,
    cache: Arc<ResolutionCache>,
    coordinator: InvalidationCoordinator,
}

impl<S: TemplateStore> TemplateService<S> {
    pub fn new(
        store: Arc<S>,
        cache: Arc<ResolutionCache>,
        coordinator: InvalidationCoordinator,
    ) -> Self {
        Self {
            resolver: TemplateResolver::new(store.clone()),
            store,
            cache,
            coordinator,
        }
    }

    /// Resolve effective template values, serving from the local cache
    /// when possible.
    ///
    /// Cache population is generation-guarded: the generation is snapshotted
    /// before the store lookups, and a result is only cached if no
    /// invalidation ran in between. Otherwise the result may predate a
    /// concurrently committed write and caching it would keep the pre-write
    /// value visible past that write's eviction.
    pub async fn resolve(
        &self,
        scope: &AccessScope,
        request: &ResolveRequest,
    ) -> Result<ResolvedTemplate, ResolveError> {
        let key = request.resolution_key(scope);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(
                application_id = %scope.application_id,
                environment_id = %scope.environment_id,
                template_type = %request.template_type,
                "resolution cache hit"
            );
            return Ok(hit);
        }

        let generation = self.cache.generation();
        let resolved = self.resolver.resolve(scope, request).await?;
        if !self
            .cache
            .insert_if_current(key, resolved.clone(), generation)
            .await
        {
            tracing::debug!(
                application_id = %scope.application_id,
                environment_id = %scope.environment_id,
                template_type = %request.template_type,
                "resolution raced an invalidation; result not cached"
            );
        }
        Ok(resolved)
    }

    /// Replace the schema for an (application, template type) pair and
    /// broadcast a wildcard invalidation for it.
    pub async fn update_schema(
        &self,
        scope: &AccessScope,
        template_type: TemplateType,
        update: SchemaUpdate,
    ) -> Result<TemplateSchema, TemplateWriteError> {
        update
            .validate()
            .map_err(|e| TemplateWriteError::validation(e.to_string()))?;
        if let Some(key) = update.duplicate_key() {
            return Err(TemplateWriteError::validation(format!(
                "duplicate field key: {key}"
            )));
        }

        let schema = TemplateSchema {
            application_id: scope.application_id,
            template_type,
            fields: update.fields.into_iter().map(Into::into).collect(),
            updated_at: Utc::now(),
        };
        self.store.put_schema(schema.clone()).await?;
        tracing::info!(
            application_id = %scope.application_id,
            template_type = %template_type,
            field_count = schema.fields.len(),
            "template schema updated"
        );

        self.coordinator
            .notify(InvalidationEvent::schema_change(
                scope.application_id,
                template_type,
            ))
            .await;
        Ok(schema)
    }

    /// Create or replace an environment-scoped override.
    pub async fn put_override(
        &self,
        scope: &AccessScope,
        template_type: TemplateType,
        identifier: &str,
        write: OverrideWrite,
    ) -> Result<OverrideRecord, TemplateWriteError> {
        if identifier.trim().is_empty() {
            return Err(TemplateWriteError::validation(
                "identifier must not be empty",
            ));
        }
        write
            .validate()
            .map_err(|e| TemplateWriteError::validation(e.to_string()))?;

        let record = OverrideRecord {
            application_id: scope.application_id,
            environment_id: scope.environment_id,
            template_type,
            identifier: identifier.to_string(),
            values: write.values,
            updated_at: Utc::now(),
        };
        self.store.put_override(record.clone()).await?;
        tracing::info!(
            application_id = %scope.application_id,
            environment_id = %scope.environment_id,
            template_type = %template_type,
            identifier = %identifier,
            "template override written"
        );

        self.coordinator
            .notify(InvalidationEvent::override_change(
                scope.application_id,
                scope.environment_id,
                template_type,
                identifier,
            ))
            .await;
        Ok(record)
    }

    /// Delete an environment-scoped override. Returns true if a record
    /// existed; deleting a missing record publishes nothing.
    pub async fn delete_override(
        &self,
        scope: &AccessScope,
        template_type: TemplateType,
        identifier: &str,
    ) -> Result<bool, TemplateWriteError> {
        let deleted = self
            .store
            .delete_override(
                scope.application_id,
                scope.environment_id,
                template_type,
                identifier,
            )
            .await?;
        if deleted {
            tracing::info!(
                application_id = %scope.application_id,
                environment_id = %scope.environment_id,
                template_type = %template_type,
                identifier = %identifier,
                "template override deleted"
            );
            self.coordinator
                .notify(InvalidationEvent::override_change(
                    scope.application_id,
                    scope.environment_id,
                    template_type,
                    identifier,
                ))
                .await;
        }
        Ok(deleted)
    }

    /// Create or replace a user-scoped override.
    pub async fn put_user_override(
        &self,
        scope: &AccessScope,
        user_id: Uuid,
        write: UserOverrideWrite,
    ) -> Result<UserOverrideRecord, TemplateWriteError> {
        write
            .validate()
            .map_err(|e| TemplateWriteError::validation(e.to_string()))?;

        let record = UserOverrideRecord {
            application_id: scope.application_id,
            environment_id: scope.environment_id,
            user_id,
            values: write.values,
            updated_at: Utc::now(),
        };
        self.store.put_user_override(record.clone()).await?;
        tracing::info!(
            application_id = %scope.application_id,
            environment_id = %scope.environment_id,
            user_id = %user_id,
            "user template override written"
        );

        self.coordinator
            .notify(InvalidationEvent::user_change(
                scope.application_id,
                scope.environment_id,
                user_id,
            ))
            .await;
        Ok(record)
    }

    /// Delete a user-scoped override. Returns true if a record existed.
    pub async fn delete_user_override(
        &self,
        scope: &AccessScope,
        user_id: Uuid,
    ) -> Result<bool, TemplateWriteError> {
        let deleted = self
            .store
            .delete_user_override(scope.application_id, scope.environment_id, user_id)
            .await?;
        if deleted {
            tracing::info!(
                application_id = %scope.application_id,
                environment_id = %scope.environment_id,
                user_id = %user_id,
                "user template override deleted"
            );
            self.coordinator
                .notify(InvalidationEvent::user_change(
                    scope.application_id,
                    scope.environment_id,
                    user_id,
                ))
                .await;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{FieldDefinitionInput, FieldType, InvalidationType};
    use domain::services::{InMemoryTemplateStore, InvalidationPublisher};
    use invalidation::{InvalidationBus, InvalidationListener};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Fixture {
        service: TemplateService<InMemoryTemplateStore>,
        store: Arc<InMemoryTemplateStore>,
        cache: Arc<ResolutionCache>,
        bus: Arc<InvalidationBus>,
        scope: AccessScope,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTemplateStore::new());
        let cache = Arc::new(ResolutionCache::new(Duration::from_secs(60)));
        let bus = Arc::new(InvalidationBus::new(32));
        let publisher: Arc<dyn InvalidationPublisher> = bus.clone();
        let service = TemplateService::new(
            store.clone(),
            cache.clone(),
            InvalidationCoordinator::new(publisher),
        );
        let scope = AccessScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        Fixture {
            service,
            store,
            cache,
            bus,
            scope,
        }
    }

    fn schema_update() -> SchemaUpdate {
        SchemaUpdate {
            fields: vec![
                FieldDefinitionInput {
                    key: "retries".to_string(),
                    field_type: FieldType::Integer,
                    default_value: json!(3),
                    description: None,
                },
                FieldDefinitionInput {
                    key: "timeout".to_string(),
                    field_type: FieldType::Integer,
                    default_value: json!(30),
                    description: None,
                },
            ],
        }
    }

    fn override_write(values: &[(&str, serde_json::Value)]) -> OverrideWrite {
        OverrideWrite {
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    async fn wait_for_empty_cache(cache: &ResolutionCache) {
        for _ in 0..50 {
            if cache.is_empty().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cache was not invalidated in time");
    }

    #[tokio::test]
    async fn test_update_schema_publishes_wildcard_event() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        f.service
            .update_schema(&f.scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, InvalidationType::SchemaChange);
        assert_eq!(event.app_id, f.scope.application_id);
        assert_eq!(event.env_id, None);
        assert_eq!(event.identifier, None);
        // Exactly one event per committed write
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_schema_rejects_duplicate_keys() {
        let f = fixture();
        let update = SchemaUpdate {
            fields: vec![
                FieldDefinitionInput {
                    key: "retries".to_string(),
                    field_type: FieldType::Integer,
                    default_value: json!(3),
                    description: None,
                },
                FieldDefinitionInput {
                    key: "retries".to_string(),
                    field_type: FieldType::Integer,
                    default_value: json!(5),
                    description: None,
                },
            ],
        };

        let err = f
            .service
            .update_schema(&f.scope, TemplateType::System, update)
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateWriteError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_put_override_publishes_exact_scope() {
        let f = fixture();
        f.service
            .update_schema(&f.scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        let mut rx = f.bus.subscribe();
        f.service
            .put_override(
                &f.scope,
                TemplateType::System,
                "payments",
                override_write(&[("timeout", json!(60))]),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, InvalidationType::OverrideChange);
        assert_eq!(event.env_id, Some(f.scope.environment_id));
        assert_eq!(event.identifier, Some("payments".to_string()));
    }

    #[tokio::test]
    async fn test_put_override_rejects_blank_identifier() {
        let f = fixture();
        let err = f
            .service
            .put_override(
                &f.scope,
                TemplateType::System,
                "  ",
                override_write(&[("timeout", json!(60))]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateWriteError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_override_publishes_nothing() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        let deleted = f
            .service
            .delete_override(&f.scope, TemplateType::System, "ghost")
            .await
            .unwrap();
        assert!(!deleted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resolve_reads_through_cache() {
        let f = fixture();
        f.service
            .update_schema(&f.scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        let request = ResolveRequest::system("payments");
        let first = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(first.get("timeout"), Some(&json!(30)));
        assert_eq!(f.cache.len().await, 1);

        // Mutate the store behind the service's back; without an
        // invalidation event the cached result keeps being served.
        f.store
            .put_override(OverrideRecord {
                application_id: f.scope.application_id,
                environment_id: f.scope.environment_id,
                template_type: TemplateType::System,
                identifier: "payments".to_string(),
                values: HashMap::from([("timeout".to_string(), json!(99))]),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let second = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(second.get("timeout"), Some(&json!(30)));
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_resolution() {
        let f = fixture();
        let listener = InvalidationListener::new(&f.bus, f.cache.clone());
        let handle = tokio::spawn(listener.run());

        f.service
            .update_schema(&f.scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        let request = ResolveRequest::system("payments");
        let stale = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(stale.get("timeout"), Some(&json!(30)));

        f.service
            .put_override(
                &f.scope,
                TemplateType::System,
                "payments",
                override_write(&[("timeout", json!(60))]),
            )
            .await
            .unwrap();
        wait_for_empty_cache(&f.cache).await;

        let fresh = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(fresh.get("timeout"), Some(&json!(60)));
        assert_eq!(fresh.applied_identifier, Some("payments".to_string()));
        handle.abort();
    }

    #[tokio::test]
    async fn test_schema_update_invalidates_across_environments() {
        let f = fixture();
        f.service
            .update_schema(&f.scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        // Subscribe after the initial write so only the second schema
        // update reaches the listener.
        let listener = InvalidationListener::new(&f.bus, f.cache.clone());
        let handle = tokio::spawn(listener.run());

        // Populate cached entries in two environments of the same application
        let other_env_scope = AccessScope::new(
            f.scope.tenant_id,
            f.scope.application_id,
            Uuid::new_v4(),
        );
        let request = ResolveRequest::system("billing");
        f.service.resolve(&f.scope, &request).await.unwrap();
        f.service.resolve(&other_env_scope, &request).await.unwrap();
        assert_eq!(f.cache.len().await, 2);

        let mut update = schema_update();
        update.fields[1].default_value = json!(45);
        f.service
            .update_schema(&f.scope, TemplateType::System, update)
            .await
            .unwrap();
        wait_for_empty_cache(&f.cache).await;

        let fresh = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(fresh.get("timeout"), Some(&json!(45)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_resolution_racing_write_is_not_cached() {
        use domain::error::StoreError;
        use std::sync::atomic::{AtomicBool, Ordering};
        use tokio::sync::Notify;

        // Store whose override lookup can park after reading its result,
        // holding a resolution in flight across a concurrent write.
        struct GatedStore {
            inner: InMemoryTemplateStore,
            armed: AtomicBool,
            entered: Notify,
            release: Notify,
        }

        impl GatedStore {
            fn new() -> Self {
                Self {
                    inner: InMemoryTemplateStore::new(),
                    armed: AtomicBool::new(false),
                    entered: Notify::new(),
                    release: Notify::new(),
                }
            }
        }

        #[async_trait::async_trait]
        impl TemplateStore for GatedStore {
            async fn get_schema(
                &self,
                application_id: Uuid,
                template_type: TemplateType,
            ) -> Result<Option<domain::models::TemplateSchema>, StoreError> {
                self.inner.get_schema(application_id, template_type).await
            }

            async fn get_override(
                &self,
                application_id: Uuid,
                environment_id: Uuid,
                template_type: TemplateType,
                identifier: &str,
            ) -> Result<Option<OverrideRecord>, StoreError> {
                let result = self
                    .inner
                    .get_override(application_id, environment_id, template_type, identifier)
                    .await;
                if self.armed.swap(false, Ordering::SeqCst) {
                    self.entered.notify_one();
                    self.release.notified().await;
                }
                result
            }

            async fn get_user_override(
                &self,
                application_id: Uuid,
                environment_id: Uuid,
                user_id: Uuid,
            ) -> Result<Option<UserOverrideRecord>, StoreError> {
                self.inner
                    .get_user_override(application_id, environment_id, user_id)
                    .await
            }

            async fn put_schema(
                &self,
                schema: domain::models::TemplateSchema,
            ) -> Result<(), StoreError> {
                self.inner.put_schema(schema).await
            }

            async fn put_override(&self, record: OverrideRecord) -> Result<(), StoreError> {
                self.inner.put_override(record).await
            }

            async fn delete_override(
                &self,
                application_id: Uuid,
                environment_id: Uuid,
                template_type: TemplateType,
                identifier: &str,
            ) -> Result<bool, StoreError> {
                self.inner
                    .delete_override(application_id, environment_id, template_type, identifier)
                    .await
            }

            async fn put_user_override(
                &self,
                record: UserOverrideRecord,
            ) -> Result<(), StoreError> {
                self.inner.put_user_override(record).await
            }

            async fn delete_user_override(
                &self,
                application_id: Uuid,
                environment_id: Uuid,
                user_id: Uuid,
            ) -> Result<bool, StoreError> {
                self.inner
                    .delete_user_override(application_id, environment_id, user_id)
                    .await
            }
        }

        let store = Arc::new(GatedStore::new());
        let cache = Arc::new(ResolutionCache::new(Duration::from_secs(60)));
        let bus = Arc::new(InvalidationBus::new(32));
        let publisher: Arc<dyn InvalidationPublisher> = bus.clone();
        let service = Arc::new(TemplateService::new(
            store.clone(),
            cache.clone(),
            InvalidationCoordinator::new(publisher),
        ));
        let listener = InvalidationListener::new(&bus, cache.clone());
        let listener_handle = tokio::spawn(listener.run());
        let scope = AccessScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        service
            .update_schema(&scope, TemplateType::System, schema_update())
            .await
            .unwrap();

        // Start a resolution and park it inside the override lookup after
        // it has read the pre-write store state.
        store.armed.store(true, Ordering::SeqCst);
        let reader = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .resolve(&scope, &ResolveRequest::system("payments"))
                    .await
            })
        };
        store.entered.notified().await;

        // Commit the write and wait for the listener to apply its event.
        let gen_before = cache.generation();
        service
            .put_override(
                &scope,
                TemplateType::System,
                "payments",
                override_write(&[("timeout", json!(60))]),
            )
            .await
            .unwrap();
        for _ in 0..50 {
            if cache.generation() > gen_before {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.generation() > gen_before);

        // Unpark the reader. Its result reflects pre-write state, which is
        // fine for that call, but it must not land in the cache.
        store.release.notify_one();
        let parked = reader.await.unwrap().unwrap();
        assert_eq!(parked.get("timeout"), Some(&json!(30)));

        let fresh = service
            .resolve(&scope, &ResolveRequest::system("payments"))
            .await
            .unwrap();
        assert_eq!(fresh.get("timeout"), Some(&json!(60)));
        listener_handle.abort();
    }

    #[tokio::test]
    async fn test_user_override_flow() {
        let f = fixture();
        let listener = InvalidationListener::new(&f.bus, f.cache.clone());
        let handle = tokio::spawn(listener.run());
        let user = Uuid::new_v4();

        f.service
            .update_schema(&f.scope, TemplateType::User, schema_update())
            .await
            .unwrap();

        let request = ResolveRequest::new(TemplateType::User).with_user(user);
        let before = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(before.get("timeout"), Some(&json!(30)));

        f.service
            .put_user_override(
                &f.scope,
                user,
                UserOverrideWrite {
                    values: HashMap::from([("timeout".to_string(), json!(120))]),
                },
            )
            .await
            .unwrap();
        wait_for_empty_cache(&f.cache).await;

        let after = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(after.get("timeout"), Some(&json!(120)));

        let deleted = f.service.delete_user_override(&f.scope, user).await.unwrap();
        assert!(deleted);
        wait_for_empty_cache(&f.cache).await;

        let reverted = f.service.resolve(&f.scope, &request).await.unwrap();
        assert_eq!(reverted.get("timeout"), Some(&json!(30)));
        handle.abort();
    }
}
