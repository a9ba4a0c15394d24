//! HTTP API Layer
//!
//! REST surface of the TISS claim engine, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: batch lifecycle, XML, operator responses and analytics
//! - **Middleware**: tenant resolution from `X-Tenant-Id`, access logging, tracing
//! - **DTOs**: validated request bodies and response shapes
//! - **Error Handling**: domain errors mapped to consistent JSON responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::from_config(config)?;
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_tiss::ports::memory::{
    InMemoryAuthorizationSource, InMemoryBatchRepository, InMemoryClinicLookup,
    InMemoryOperatorLookup,
};
use domain_tiss::{ClaimsAnalytics, TissCodec, TissError, TissPorts, TissService};

use crate::adapters::LocalFileStore;
use crate::config::ApiConfig;
use crate::handlers::{analytics, health, tiss};
use crate::middleware::{access_log_middleware, tenant_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TissService>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Wires the service over the given ports
    pub fn new(config: ApiConfig, ports: TissPorts) -> Result<Self, TissError> {
        let codec = TissCodec::new(config.codec_config());
        let analytics = ClaimsAnalytics::new(ports.operators.clone(), config.alert_thresholds()?);
        let service = TissService::new(ports, codec, analytics);

        Ok(Self {
            service: Arc::new(service),
            config: Arc::new(config),
        })
    }

    /// In-memory stores seeded from the configured master data, XML on disk
    pub fn from_config(config: ApiConfig) -> Result<Self, TissError> {
        let ports = TissPorts {
            batches: Arc::new(InMemoryBatchRepository::new()),
            clinics: Arc::new(InMemoryClinicLookup::with_clinics(config.clinics.clone())),
            operators: Arc::new(InMemoryOperatorLookup::with_operators(config.operators.clone())),
            files: Arc::new(LocalFileStore::new(config.tiss.xml_output_dir.clone())),
            authorizations: Arc::new(InMemoryAuthorizationSource::new()),
        };
        Self::new(config, ports)
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let batch_routes = Router::new()
        .route("/", post(tiss::create_batch).get(tiss::list_batches))
        .route("/:id", get(tiss::get_batch))
        .route("/:id/guides", post(tiss::add_guide))
        .route("/:id/guides/:guide_id", delete(tiss::remove_guide))
        .route("/:id/xml", post(tiss::generate_xml))
        .route("/:id/ready", post(tiss::mark_ready))
        .route("/:id/submit", post(tiss::submit_batch))
        .route("/:id/processing", post(tiss::mark_processing))
        .route("/:id/response", post(tiss::process_response))
        .route("/:id/paid", post(tiss::mark_paid))
        .route("/:id/reject", post(tiss::reject_batch));

    let analytics_routes = Router::new()
        .route("/summary", get(analytics::glosa_summary))
        .route("/by-operator", get(analytics::glosas_by_operator))
        .route("/trend", get(analytics::glosa_trend))
        .route("/procedures", get(analytics::procedure_glosas))
        .route("/approval-time", get(analytics::approval_time))
        .route("/monthly-performance", get(analytics::monthly_performance))
        .route("/alerts", get(analytics::glosa_alerts))
        .route("/authorization-rate", get(analytics::authorization_rate));

    // Tenant-scoped API routes
    let tiss_routes = Router::new()
        .nest("/batches", batch_routes)
        .route("/xml/validate", post(tiss::validate_xml))
        .nest("/analytics", analytics_routes)
        .layer(axum_middleware::from_fn(tenant_middleware));

    let api_routes = Router::new()
        .nest("/tiss", tiss_routes)
        .layer(axum_middleware::from_fn(access_log_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
