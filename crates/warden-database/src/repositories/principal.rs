//! Principal repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_entity::{LoginEvent, NewLoginEvent, NewPrincipal, Principal};

use super::map_write_error;
use crate::directory::PrincipalRepository;

/// PostgreSQL-backed principal storage.
#[derive(Debug, Clone)]
pub struct PgPrincipalRepository {
    pool: PgPool,
}

impl PgPrincipalRepository {
    /// Create a new principal repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for PgPrincipalRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Principal>> {
        sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find principal by id", e)
            })
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>> {
        sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE email = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find principal by email", e)
            })
    }

    async fn find_by_provider_id(
        &self,
        provider: &str,
        subject: &str,
    ) -> AppResult<Option<Principal>> {
        sqlx::query_as::<_, Principal>(
            "SELECT * FROM principals WHERE provider = $1 AND provider_subject = $2",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to find principal by provider id",
                e,
            )
        })
    }

    async fn create(&self, data: &NewPrincipal) -> AppResult<Principal> {
        sqlx::query_as::<_, Principal>(
            "INSERT INTO principals \
                 (email, name, password_hash, provider, provider_subject, role_id, verified) \
             VALUES (LOWER($1), $2, $3, $4, $5, $6, $7) \
             RETURNING *",
        )
        .bind(&data.email)
        .bind(&data.name)
        .bind(&data.password_hash)
        .bind(&data.provider)
        .bind(&data.provider_subject)
        .bind(data.role_id)
        .bind(data.verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Email already registered", "Failed to create principal"))
    }

    async fn list(&self, role_id: Option<Uuid>) -> AppResult<Vec<Principal>> {
        sqlx::query_as::<_, Principal>(
            "SELECT * FROM principals WHERE ($1::uuid IS NULL OR role_id = $1) \
             ORDER BY created_at, email",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list principals", e))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE principals SET active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to set active flag", e)
                })?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE principals SET role_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(role_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_provider(
        &self,
        id: Uuid,
        provider: &str,
        subject: &str,
        verified: bool,
    ) -> AppResult<Option<Principal>> {
        sqlx::query_as::<_, Principal>(
            "UPDATE principals SET provider = $2, provider_subject = $3, \
                 verified = verified OR $4, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(provider)
        .bind(subject)
        .bind(verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Identity already linked to another principal", "Failed to link identity")
        })
    }

    async fn increment_failed_attempts(&self, id: Uuid) -> AppResult<i32> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE principals SET failed_login_attempts = failed_login_attempts + 1, \
                                   updated_at = NOW() \
             WHERE id = $1 RETURNING failed_login_attempts",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to increment failed attempts",
                e,
            )
        })?;

        row.map(|r| r.0)
            .ok_or_else(|| AppError::not_found(format!("Principal {id} not found")))
    }

    async fn reset_failed_attempts(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE principals SET failed_login_attempts = 0, locked_until = NULL, \
                                   updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to reset failed attempts", e)
        })?;
        Ok(())
    }

    async fn set_lock_until(&self, id: Uuid, until: Option<DateTime<Utc>>) -> AppResult<()> {
        sqlx::query("UPDATE principals SET locked_until = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set lock", e))?;
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE principals SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update last login", e)
            })?;
        Ok(())
    }

    async fn count_by_role(&self, role_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM principals WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count principals by role", e)
            })?;
        Ok(count as u64)
    }

    async fn record_login_event(&self, event: &NewLoginEvent) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO login_events \
                 (principal_id, ip_address, user_agent, method, success, failure_reason) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.principal_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.method)
        .bind(event.success)
        .bind(&event.failure_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record login event", e))?;
        Ok(())
    }

    async fn recent_login_events(&self, id: Uuid, limit: u32) -> AppResult<Vec<LoginEvent>> {
        sqlx::query_as::<_, LoginEvent>(
            "SELECT * FROM login_events WHERE principal_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list login events", e))
    }
}
