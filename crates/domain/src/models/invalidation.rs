//! Invalidation events and the cache-key scope model.
//!
//! Every committed write to a schema or override record produces exactly one
//! event whose scope subsumes the changed key. Cache holders evict every
//! entry the event subsumes, immediately on receipt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::template::TemplateType;

/// Well-known pub/sub channel carrying invalidation events.
pub const INVALIDATION_CHANNEL: &str = "template:invalidate";

/// Kind of write that produced an invalidation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidationType {
    SchemaChange,
    OverrideChange,
    UserChange,
}

impl std::fmt::Display for InvalidationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationType::SchemaChange => write!(f, "SCHEMA_CHANGE"),
            InvalidationType::OverrideChange => write!(f, "OVERRIDE_CHANGE"),
            InvalidationType::UserChange => write!(f, "USER_CHANGE"),
        }
    }
}

/// Composite key identifying one cached resolution result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub template_type: TemplateType,
    pub identifier: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Ephemeral message published after a committed schema/override write.
///
/// `env_id = None` means "all environments" and is only produced for schema
/// changes. `identifier = None` means wildcard invalidation for the scope.
/// For `USER_CHANGE` events the identifier field carries the affected user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    #[serde(rename = "type")]
    pub event_type: InvalidationType,
    pub app_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_id: Option<Uuid>,
    pub template_type: TemplateType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl InvalidationEvent {
    /// Event for a changed schema. Defaults apply to every environment, so
    /// the scope is the whole (application, type) pair.
    pub fn schema_change(app_id: Uuid, template_type: TemplateType) -> Self {
        Self {
            event_type: InvalidationType::SchemaChange,
            app_id,
            env_id: None,
            template_type,
            identifier: None,
        }
    }

    /// Event for a created, updated, or deleted environment-scoped override,
    /// carrying the exact key of the affected record.
    pub fn override_change(
        app_id: Uuid,
        env_id: Uuid,
        template_type: TemplateType,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            event_type: InvalidationType::OverrideChange,
            app_id,
            env_id: Some(env_id),
            template_type,
            identifier: Some(identifier.into()),
        }
    }

    /// Event for a created, updated, or deleted user override. User overrides
    /// only affect `USER` resolution, and the identifier field carries the
    /// affected user id.
    pub fn user_change(app_id: Uuid, env_id: Uuid, user_id: Uuid) -> Self {
        Self {
            event_type: InvalidationType::UserChange,
            app_id,
            env_id: Some(env_id),
            template_type: TemplateType::User,
            identifier: Some(user_id.to_string()),
        }
    }

    /// Whether this event's scope covers the given cached resolution key.
    ///
    /// - `SCHEMA_CHANGE` covers every entry for (application, type) across
    ///   all environments, identifiers, and users.
    /// - `OVERRIDE_CHANGE` covers entries with the exact
    ///   (application, environment, type, identifier), including user-scoped
    ///   entries layered on that identifier.
    /// - `USER_CHANGE` covers the `USER` entries for the affected user in
    ///   the given (application, environment).
    pub fn subsumes(&self, key: &ResolutionKey) -> bool {
        if key.application_id != self.app_id {
            return false;
        }
        match self.event_type {
            InvalidationType::SchemaChange => key.template_type == self.template_type,
            InvalidationType::OverrideChange => {
                key.template_type == self.template_type
                    && Some(key.environment_id) == self.env_id
                    && (self.identifier.is_none() || key.identifier == self.identifier)
            }
            InvalidationType::UserChange => {
                key.template_type == TemplateType::User
                    && Some(key.environment_id) == self.env_id
                    && key.user_id.map(|u| u.to_string()) == self.identifier
            }
        }
    }
}
