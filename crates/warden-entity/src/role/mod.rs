//! Role entity.

pub mod model;

pub use model::{NewRole, Role};
