//! Pre-validated access scope passed into the resolution core.

use uuid::Uuid;

/// Tenant scope a request has already been authorized for.
///
/// The caller (the access-scope enforcer upstream of this crate) is
/// responsible for verifying that `application_id` and `environment_id`
/// belong to `tenant_id` before constructing a scope. The core performs
/// no authorization checks of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessScope {
    pub tenant_id: Uuid,
    pub application_id: Uuid,
    pub environment_id: Uuid,
}

impl AccessScope {
    pub fn new(tenant_id: Uuid, application_id: Uuid, environment_id: Uuid) -> Self {
        Self {
            tenant_id,
            application_id,
            environment_id,
        }
    }
}
