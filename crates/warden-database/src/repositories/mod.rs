//! PostgreSQL repository implementations.

pub mod permission;
pub mod principal;
pub mod role;

pub use permission::PgPermissionRepository;
pub use principal::PgPrincipalRepository;
pub use role::PgRoleRepository;

use warden_core::error::{AppError, ErrorKind};

/// Map an insert/update failure, turning unique violations into conflicts.
pub(crate) fn map_write_error(err: sqlx::Error, conflict: &str, context: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::conflict(conflict.to_string())
        }
        _ => AppError::with_source(ErrorKind::Database, context.to_string(), err),
    }
}
