//! Time bound for directory round-trips.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use warden_core::error::AppError;
use warden_core::result::AppResult;

/// Await a directory call, failing with a timeout error after `limit`.
pub(crate) async fn directory_call<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Directory call timed out"
            );
            Err(AppError::timeout(format!(
                "Directory call '{operation}' timed out"
            )))
        }
    }
}
