//! Principal entity.

pub mod model;

pub use model::{NewPrincipal, Principal};
