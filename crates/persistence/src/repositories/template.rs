//! Template repository for database operations.
//!
//! The read side performs point lookups only; no range scans are needed.
//! Writes to a single record go through one statement each, so PostgreSQL's
//! row-level isolation serializes concurrent writes per key.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    OverrideEntity, TemplateSchemaEntity, TemplateTypeDb, UserOverrideEntity,
};
use crate::metrics::QueryTimer;

/// Repository for template schema and override database operations.
#[derive(Clone)]
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    /// Creates a new TemplateRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Get the schema for an (application, template type) pair.
    pub async fn get_schema(
        &self,
        application_id: Uuid,
        template_type: TemplateTypeDb,
    ) -> Result<Option<TemplateSchemaEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_schema");
        let result = sqlx::query_as::<_, TemplateSchemaEntity>(
            r#"
            SELECT application_id, template_type, fields, created_at, updated_at
            FROM template_schemas
            WHERE application_id = $1 AND template_type = $2
            "#,
        )
        .bind(application_id)
        .bind(template_type)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create or replace the schema for an (application, template type) pair.
    pub async fn upsert_schema(
        &self,
        application_id: Uuid,
        template_type: TemplateTypeDb,
        fields: serde_json::Value,
    ) -> Result<TemplateSchemaEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_schema");
        let result = sqlx::query_as::<_, TemplateSchemaEntity>(
            r#"
            INSERT INTO template_schemas (application_id, template_type, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (application_id, template_type) DO UPDATE SET
                fields = EXCLUDED.fields,
                updated_at = NOW()
            RETURNING application_id, template_type, fields, created_at, updated_at
            "#,
        )
        .bind(application_id)
        .bind(template_type)
        .bind(fields)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    // =========================================================================
    // Environment-scoped overrides
    // =========================================================================

    /// Get the override record for an exact composite key.
    pub async fn get_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateTypeDb,
        identifier: &str,
    ) -> Result<Option<OverrideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_override");
        let result = sqlx::query_as::<_, OverrideEntity>(
            r#"
            SELECT application_id, environment_id, template_type, identifier,
                   "values", created_at, updated_at
            FROM template_overrides
            WHERE application_id = $1 AND environment_id = $2
              AND template_type = $3 AND identifier = $4
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(template_type)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create or replace an override record.
    pub async fn upsert_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateTypeDb,
        identifier: &str,
        values: serde_json::Value,
    ) -> Result<OverrideEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_override");
        let result = sqlx::query_as::<_, OverrideEntity>(
            r#"
            INSERT INTO template_overrides (
                application_id, environment_id, template_type, identifier, "values"
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (application_id, environment_id, template_type, identifier)
            DO UPDATE SET
                "values" = EXCLUDED."values",
                updated_at = NOW()
            RETURNING application_id, environment_id, template_type, identifier,
                      "values", created_at, updated_at
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(template_type)
        .bind(identifier)
        .bind(values)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an override record. Returns true if a row was removed.
    pub async fn delete_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        template_type: TemplateTypeDb,
        identifier: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_override");
        let result = sqlx::query(
            r#"
            DELETE FROM template_overrides
            WHERE application_id = $1 AND environment_id = $2
              AND template_type = $3 AND identifier = $4
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(template_type)
        .bind(identifier)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    // =========================================================================
    // User-scoped overrides
    // =========================================================================

    /// Get the user override record for an exact composite key.
    pub async fn get_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserOverrideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_user_override");
        let result = sqlx::query_as::<_, UserOverrideEntity>(
            r#"
            SELECT application_id, environment_id, user_id, "values", created_at, updated_at
            FROM user_template_overrides
            WHERE application_id = $1 AND environment_id = $2 AND user_id = $3
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create or replace a user override record.
    pub async fn upsert_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
        values: serde_json::Value,
    ) -> Result<UserOverrideEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_user_override");
        let result = sqlx::query_as::<_, UserOverrideEntity>(
            r#"
            INSERT INTO user_template_overrides (
                application_id, environment_id, user_id, "values"
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (application_id, environment_id, user_id)
            DO UPDATE SET
                "values" = EXCLUDED."values",
                updated_at = NOW()
            RETURNING application_id, environment_id, user_id, "values", created_at, updated_at
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(user_id)
        .bind(values)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete a user override record. Returns true if a row was removed.
    pub async fn delete_user_override(
        &self,
        application_id: Uuid,
        environment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_user_override");
        let result = sqlx::query(
            r#"
            DELETE FROM user_template_overrides
            WHERE application_id = $1 AND environment_id = $2 AND user_id = $3
            "#,
        )
        .bind(application_id)
        .bind(environment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }
}
