//! # warden-database
//!
//! Directory Store for Warden: the repository traits the authentication
//! engine consumes, their PostgreSQL implementations, and an in-memory
//! directory used by tests and local runs.

pub mod connection;
pub mod directory;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use directory::{Directory, PermissionRepository, PrincipalRepository, RoleRepository};
pub use memory::MemoryDirectory;
