//! Closed error type returned by every authentication operation.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};

/// Convenience alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Every failure the engine reports to its callers.
///
/// Infrastructure details never leak through this type; they are logged
/// where the underlying [`AppError`] is converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. The two are indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    /// The refresh token was rotated, logged out, or never recorded.
    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Role is still assigned to one or more principals")]
    RoleInUse,

    #[error("Permission {0} does not exist")]
    InvalidPermissionReference(Uuid),

    #[error("Directory is unavailable")]
    DirectoryUnavailable,

    #[error("Token store is unavailable")]
    StoreUnavailable,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("Role already exists")]
    RoleAlreadyExists,

    #[error("Permission not found")]
    PermissionNotFound,

    #[error("Permission already exists")]
    PermissionAlreadyExists,

    #[error("Principal not found")]
    PrincipalNotFound,

    /// The OAuth state is unknown, expired, or was already used.
    #[error("Invalid or expired OAuth state")]
    InvalidOAuthState,

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable upper-snake code for API envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::RoleNotFound => "ROLE_NOT_FOUND",
            Self::RoleInUse => "ROLE_IN_USE",
            Self::InvalidPermissionReference(_) => "INVALID_PERMISSION_REFERENCE",
            Self::DirectoryUnavailable => "DIRECTORY_UNAVAILABLE",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::RoleAlreadyExists => "ROLE_ALREADY_EXISTS",
            Self::PermissionNotFound => "PERMISSION_NOT_FOUND",
            Self::PermissionAlreadyExists => "PERMISSION_ALREADY_EXISTS",
            Self::PrincipalNotFound => "PRINCIPAL_NOT_FOUND",
            Self::InvalidOAuthState => "INVALID_OAUTH_STATE",
            Self::IdentityProvider(_) => "IDENTITY_PROVIDER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert a store failure. Store errors always deny the request.
    pub(crate) fn store(err: AppError) -> Self {
        error!(error = %err, "Token store operation failed");
        Self::StoreUnavailable
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind {
            ErrorKind::Database | ErrorKind::Timeout => {
                error!(error = %err, "Directory operation failed");
                Self::DirectoryUnavailable
            }
            ErrorKind::Cache => Self::store(err),
            ErrorKind::ExternalService => Self::IdentityProvider(err.message),
            ErrorKind::Validation => Self::InvalidToken(err.message),
            _ => {
                error!(error = %err, "Unexpected infrastructure error");
                Self::Internal(err.message)
            }
        }
    }
}
