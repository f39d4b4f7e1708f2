//! Rate limiting, account lockout, and password policy configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Security policy knobs shared by the login, refresh, and register flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Requests allowed per identity and route within one window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    /// Rate limit window length in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    /// Consecutive failed logins that lock an account.
    #[serde(default = "default_max_failed")]
    pub max_failed_attempts: i32,
    /// Account lockout duration in minutes.
    #[serde(default = "default_lockout")]
    pub lockout_duration_minutes: u64,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
    /// Require upper, lower, digit, and special characters.
    #[serde(default = "default_true")]
    pub password_require_complexity: bool,
}

impl SecurityConfig {
    /// Rate limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    /// Account lockout duration.
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_minutes * 60)
    }

    /// Reject policies that can never be satisfied or never trigger.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_failed_attempts < 1 {
            return Err(AppError::configuration(
                "security.max_failed_attempts must be at least 1",
            ));
        }
        if self.rate_limit_requests == 0 || self.rate_limit_window_seconds == 0 {
            return Err(AppError::configuration(
                "security.rate_limit_requests and security.rate_limit_window_seconds must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window(),
            max_failed_attempts: default_max_failed(),
            lockout_duration_minutes: default_lockout(),
            password_min_length: default_password_min(),
            password_require_complexity: default_true(),
        }
    }
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_max_failed() -> i32 {
    5
}

fn default_lockout() -> u64 {
    15
}

fn default_password_min() -> usize {
    8
}

fn default_true() -> bool {
    true
}
