//! External identity providers.

pub mod google;
pub mod provider;

pub use google::GoogleIdentityClient;
pub use provider::{ExternalIdentity, IdentityProviderClient};
