//! Template resolution: layering schema defaults, environment-scoped
//! overrides, and user overrides into an effective value set.
//!
//! Precedence is fixed and must not be reordered:
//! 1. Schema defaults seed every recognized field.
//! 2. An environment-scoped override overwrites the fields it explicitly
//!    sets (partial merge, not replacement).
//! 3. A user override overwrites fields it sets, for `USER` templates only.
//!
//! Resolution is read-only and idempotent: repeated calls over unchanged
//! backing data return identical results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::models::{
    AccessScope, OverrideRecord, ResolutionKey, TemplateSchema, TemplateType, UserOverrideRecord,
};
use crate::services::store::TemplateStore;

/// Which layer produced a resolved field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    SchemaDefault,
    ScopedOverride,
    UserOverride,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::SchemaDefault => write!(f, "schema_default"),
            ValueSource::ScopedOverride => write!(f, "scoped_override"),
            ValueSource::UserOverride => write!(f, "user_override"),
        }
    }
}

/// Parameters for one resolution call.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub template_type: TemplateType,
    pub identifier: Option<String>,
    pub user_id: Option<Uuid>,
    /// Skip override lookups and return schema defaults only.
    pub defaults_only: bool,
}

impl ResolveRequest {
    pub fn new(template_type: TemplateType) -> Self {
        Self {
            template_type,
            identifier: None,
            user_id: None,
            defaults_only: false,
        }
    }

    /// Resolution of a `SYSTEM` template instance by identifier.
    pub fn system(identifier: impl Into<String>) -> Self {
        Self {
            template_type: TemplateType::System,
            identifier: Some(identifier.into()),
            user_id: None,
            defaults_only: false,
        }
    }

    /// Defaults-only resolution for the given template type.
    pub fn defaults(template_type: TemplateType) -> Self {
        Self {
            template_type,
            identifier: None,
            user_id: None,
            defaults_only: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Cache key for the result of this request within the given scope.
    pub fn resolution_key(&self, scope: &AccessScope) -> ResolutionKey {
        ResolutionKey {
            application_id: scope.application_id,
            environment_id: scope.environment_id,
            template_type: self.template_type,
            identifier: if self.defaults_only {
                None
            } else {
                self.identifier.clone()
            },
            user_id: if self.defaults_only {
                None
            } else {
                self.user_id
            },
        }
    }

    fn check_identifier_scope(&self) -> Result<(), ResolveError> {
        if self.defaults_only {
            return Ok(());
        }
        if self.template_type == TemplateType::System && self.identifier.is_none() {
            return Err(ResolveError::invalid_identifier_scope(
                "identifier is required when resolving a SYSTEM template",
            ));
        }
        if self.template_type == TemplateType::System && self.user_id.is_some() {
            return Err(ResolveError::invalid_identifier_scope(
                "user overrides only apply to USER templates",
            ));
        }
        Ok(())
    }
}

/// Effective merged value set for one request context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTemplate {
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    /// Included so callers can distinguish default from overridden fields
    /// without a second call.
    pub schema: TemplateSchema,
    pub values: HashMap<String, serde_json::Value>,
    pub applied_identifier: Option<String>,
    pub sources: HashMap<String, ValueSource>,
}

impl ResolvedTemplate {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn source(&self, key: &str) -> Option<&ValueSource> {
        self.sources.get(key)
    }
}

/// Merge schema defaults with optional override layers.
///
/// Fields an override sets that the schema does not define are ignored;
/// the schema is authoritative for the field set.
pub fn merge_effective_values(
    schema: &TemplateSchema,
    scoped: Option<&OverrideRecord>,
    user: Option<&UserOverrideRecord>,
) -> ResolvedTemplate {
    let mut values = schema.default_values();
    let mut sources: HashMap<String, ValueSource> = values
        .keys()
        .map(|key| (key.clone(), ValueSource::SchemaDefault))
        .collect();

    let mut applied_identifier = None;
    if let Some(record) = scoped {
        for (key, value) in &record.values {
            if !schema.recognizes(key) {
                continue;
            }
            values.insert(key.clone(), value.clone());
            sources.insert(key.clone(), ValueSource::ScopedOverride);
        }
        applied_identifier = Some(record.identifier.clone());
    }

    if let Some(record) = user {
        for (key, value) in &record.values {
            if !schema.recognizes(key) {
                continue;
            }
            values.insert(key.clone(), value.clone());
            sources.insert(key.clone(), ValueSource::UserOverride);
        }
    }

    ResolvedTemplate {
        template_type: schema.template_type,
        schema: schema.clone(),
        values,
        applied_identifier,
        sources,
    }
}

/// Computes effective template values via point lookups against a store.
pub struct TemplateResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for TemplateResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: TemplateStore> TemplateResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve the effective value set for a pre-authorized scope.
    ///
    /// Fails with `SchemaNotFound` when no schema exists for the
    /// (application, type) pair, and `InvalidIdentifierScope` when the
    /// request violates the identifier rules for its template type.
    pub async fn resolve(
        &self,
        scope: &AccessScope,
        request: &ResolveRequest,
    ) -> Result<ResolvedTemplate, ResolveError> {
        request.check_identifier_scope()?;

        let schema = self
            .store
            .get_schema(scope.application_id, request.template_type)
            .await?
            .ok_or(ResolveError::SchemaNotFound {
                application_id: scope.application_id,
                template_type: request.template_type,
            })?;

        let scoped = match &request.identifier {
            Some(identifier) if !request.defaults_only => {
                self.store
                    .get_override(
                        scope.application_id,
                        scope.environment_id,
                        request.template_type,
                        identifier,
                    )
                    .await?
            }
            _ => None,
        };

        let user = match request.user_id {
            Some(user_id)
                if request.template_type == TemplateType::User && !request.defaults_only =>
            {
                self.store
                    .get_user_override(scope.application_id, scope.environment_id, user_id)
                    .await?
            }
            _ => None,
        };

        let resolved = merge_effective_values(&schema, scoped.as_ref(), user.as_ref());
        tracing::debug!(
            application_id = %scope.application_id,
            environment_id = %scope.environment_id,
            template_type = %request.template_type,
            applied_identifier = ?resolved.applied_identifier,
            "resolved template values"
        );
        Ok(resolved)
    }
}
