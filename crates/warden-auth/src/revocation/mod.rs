//! Refresh-token revocation records and other short-lived auth state.

pub mod store;

pub use store::{OAuthState, RevocationStatus, RevocationStore};
