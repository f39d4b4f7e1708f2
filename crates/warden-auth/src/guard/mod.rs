//! Failed-login counting and account lockout.

pub mod lockout;

pub use lockout::{AccountGuard, FailureOutcome, LockoutState};
