//! Login history.

pub mod model;

pub use model::{LoginEvent, NewLoginEvent};
