//! Session orchestration: register, login, refresh, logout and OAuth.

pub mod manager;
pub mod principal_cache;
pub mod rate_limit;
pub mod types;

pub use manager::SessionManager;
pub use principal_cache::PrincipalCache;
pub use rate_limit::RateLimiter;
pub use types::{ClientInfo, OAuthCompletion, OAuthStart, PrincipalSnapshot, TokenResponse};
