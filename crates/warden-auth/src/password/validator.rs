//! Password policy for new credentials.

use warden_core::config::SecurityConfig;

use crate::error::{AuthError, AuthResult};

/// Checks new passwords against the configured policy.
#[derive(Debug, Clone)]
pub struct PasswordValidator {
    min_length: usize,
    require_complexity: bool,
}

impl PasswordValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            min_length: config.password_min_length,
            require_complexity: config.password_require_complexity,
        }
    }

    /// Returns the first violated rule as [`AuthError::WeakPassword`].
    pub fn validate(&self, password: &str) -> AuthResult<()> {
        if password.chars().count() < self.min_length {
            return Err(weak(format!(
                "must be at least {} characters long",
                self.min_length
            )));
        }

        if !self.require_complexity {
            return Ok(());
        }

        if !password.chars().any(char::is_uppercase) {
            return Err(weak("must contain an uppercase letter"));
        }
        if !password.chars().any(char::is_lowercase) {
            return Err(weak("must contain a lowercase letter"));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(weak("must contain a digit"));
        }
        if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
            return Err(weak("must contain a special character"));
        }

        Ok(())
    }
}

fn weak(reason: impl Into<String>) -> AuthError {
    AuthError::WeakPassword(reason.into())
}
