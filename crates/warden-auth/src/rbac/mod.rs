//! Role-based access control.
//!
//! A principal's permissions come only from its role reference:
//! principal → role → permissions. The `manage` action on a resource
//! implies every other action on that resource.

pub mod admin;
pub mod catalog;
pub mod resolver;

pub use admin::{PermissionUpdate, RoleAdmin, RoleDetails, RoleDraft, RoleUpdate};
pub use catalog::{BootstrapReport, bootstrap_defaults};
pub use resolver::{RbacResolver, ResolvedAccess, permits};
