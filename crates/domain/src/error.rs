//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::models::TemplateType;

/// Error raised by a template store implementation.
#[derive(Debug, Error)]
#[error("template store error: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors surfaced by template resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no template schema configured for application {application_id} with type {template_type}")]
    SchemaNotFound {
        application_id: Uuid,
        template_type: TemplateType,
    },

    #[error("invalid identifier scope: {message}")]
    InvalidIdentifierScope { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    pub fn invalid_identifier_scope(message: impl Into<String>) -> Self {
        Self::InvalidIdentifierScope {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the schema/override write operations.
#[derive(Debug, Error)]
pub enum TemplateWriteError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TemplateWriteError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Error raised when the invalidation transport cannot accept an event.
///
/// Never fails the write that triggered the publish; the coordinator logs
/// and swallows it, leaving caches to self-heal via entry expiry.
#[derive(Debug, Error)]
#[error("invalidation transport unavailable: {message}")]
pub struct PublishError {
    pub message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
