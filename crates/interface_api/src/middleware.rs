//! API middleware

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::TenantId;

use crate::error::ApiError;

/// Header carrying the tenant every TISS request is scoped to
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant resolved from the request, available to handlers as an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub TenantId);

fn tenant_from_headers(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let raw = headers
        .get(TENANT_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing X-Tenant-Id header".to_string()))?;

    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<TenantId>().ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid X-Tenant-Id header".to_string()))
}

/// Tenant middleware
///
/// Rejects requests without a valid `X-Tenant-Id` and stores the tenant in
/// the request extensions.
pub async fn tenant_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant = match tenant_from_headers(request.headers()) {
        Ok(tenant) => tenant,
        Err(e) => {
            warn!(uri = %request.uri(), error = %e, "Request rejected without tenant");
            return Err(e);
        }
    };

    request.extensions_mut().insert(Tenant(tenant));
    Ok(next.run(request).await)
}

/// Access log middleware
///
/// Logs every API request with its tenant, status and duration.
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let tenant = tenant_from_headers(request.headers())
        .map(|t| t.to_string())
        .unwrap_or_else(|_| "none".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        tenant = %tenant,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
