//! # warden-core
//!
//! Core crate for Warden. Contains the configuration schema, the
//! key-value store capability consumed by the revocation layer, and the
//! unified infrastructure error type.
//!
//! This crate has **no** internal dependencies on other Warden crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
