//! # warden-entity
//!
//! Directory entity models for Warden. Every struct in this crate
//! represents a database table row or the input used to create one. Row
//! types derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! `sqlx::FromRow`.

pub mod audit;
pub mod permission;
pub mod principal;
pub mod role;

pub use audit::{LoginEvent, NewLoginEvent};
pub use permission::{NewPermission, Permission};
pub use principal::{NewPrincipal, Principal};
pub use role::{NewRole, Role};
