//! Request handlers

pub mod analytics;
pub mod health;
pub mod tiss;

use domain_tiss::TissError;

use crate::error::ApiError;

/// Runs a service call that touches the filesystem off the async workers
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, TissError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {}", e)))?
        .map_err(ApiError::from)
}
