//! # warden-auth
//!
//! Credential lifecycle and access control for Warden.
//!
//! ## Modules
//!
//! - `jwt`: access/refresh token signing and verification (pure, no I/O)
//! - `password`: Argon2id hashing and password policy
//! - `revocation`: refresh-token revocation records, OAuth state, session cache
//! - `guard`: failed-login counting and account lockout
//! - `rbac`: effective permission resolution, role administration, default catalog
//! - `oauth`: external identity provider clients
//! - `session`: the orchestrator composing all of the above

pub mod error;
pub mod guard;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod rbac;
pub mod revocation;
pub mod session;

mod bounded;
mod random;

pub use error::{AuthError, AuthResult};
pub use guard::{AccountGuard, LockoutState};
pub use jwt::{AccessClaims, RefreshClaims, TokenDecoder, TokenEncoder, TokenError};
pub use oauth::{ExternalIdentity, GoogleIdentityClient, IdentityProviderClient};
pub use password::{PasswordHasher, PasswordValidator};
pub use rbac::{BootstrapReport, RbacResolver, RoleAdmin, RoleDetails, bootstrap_defaults};
pub use revocation::{RevocationStatus, RevocationStore};
pub use session::{
    ClientInfo, OAuthCompletion, OAuthStart, PrincipalSnapshot, SessionManager, TokenResponse,
};
