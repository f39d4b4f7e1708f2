//! Permission entity.

pub mod model;

pub use model::{MANAGE_ACTION, NewPermission, Permission, scope};
