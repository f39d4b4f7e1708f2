//! Signed access and refresh tokens.
//!
//! Encoding and decoding are pure and synchronous. Refresh-token
//! revocation lives in [`crate::revocation`], not here.

pub mod claims;
pub mod decoder;
pub mod encoder;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use decoder::{TokenDecoder, TokenError};
pub use encoder::{IssuedToken, TokenEncoder};
