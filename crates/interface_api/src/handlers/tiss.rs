//! Claim batch handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BatchId, ClinicId, GuideId, OperatorId};
use domain_tiss::{BatchResponse, XmlValidationResult};

use crate::dto::tiss::*;
use crate::handlers::run_blocking;
use crate::middleware::Tenant;
use crate::{error::ApiError, AppState};

/// Creates an empty draft batch
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<BatchDetails>), ApiError> {
    let batch = state.service.create_batch(
        tenant,
        ClinicId::from(request.clinic_id),
        OperatorId::from(request.operator_id),
    )?;
    Ok((StatusCode::CREATED, Json(BatchDetails::from(&batch))))
}

/// Lists a clinic's batches
pub async fn list_batches(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<ListBatchesQuery>,
) -> Result<Json<Vec<BatchDetails>>, ApiError> {
    let batches = state
        .service
        .list_batches(tenant, ClinicId::from(query.clinic_id))?;
    Ok(Json(batches.iter().map(BatchDetails::from).collect()))
}

/// Gets a batch by ID
pub async fn get_batch(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetails>, ApiError> {
    let batch = state.service.get_batch(tenant, BatchId::from(id))?;
    Ok(Json(BatchDetails::from(&batch)))
}

/// Adds a guide to a draft batch
pub async fn add_guide(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddGuideRequest>,
) -> Result<(StatusCode, Json<BatchDetails>), ApiError> {
    request.validate()?;
    let guide = request.into_guide()?;
    let batch = state.service.add_guide(tenant, BatchId::from(id), guide)?;
    Ok((StatusCode::CREATED, Json(BatchDetails::from(&batch))))
}

/// Removes a guide from a draft batch
pub async fn remove_guide(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path((id, guide_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchDetails>, ApiError> {
    let batch = state
        .service
        .remove_guide(tenant, BatchId::from(id), GuideId::from(guide_id))?;
    Ok(Json(BatchDetails::from(&batch)))
}

/// Renders, validates and stores the batch XML
pub async fn generate_xml(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
) -> Result<Json<GeneratedXmlResponse>, ApiError> {
    let service = state.service.clone();
    let (batch, document) =
        run_blocking(move || service.generate_xml(tenant, BatchId::from(id))).await?;
    Ok(Json(GeneratedXmlResponse::new(&batch, document)))
}

/// Checks the structure of a TISS XML document sent as the raw body
pub async fn validate_xml(
    State(state): State<AppState>,
    body: String,
) -> Json<XmlValidationResult> {
    Json(state.service.validate_xml(&body))
}

pub async fn mark_ready(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetails>, ApiError> {
    let batch = state.service.mark_ready_to_send(tenant, BatchId::from(id))?;
    Ok(Json(BatchDetails::from(&batch)))
}

/// Records the operator protocol and sends every guide
pub async fn submit_batch(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitBatchRequest>,
) -> Result<Json<BatchDetails>, ApiError> {
    request.validate()?;
    let batch = state
        .service
        .submit(tenant, BatchId::from(id), request.protocol_number)?;
    Ok(Json(BatchDetails::from(&batch)))
}

pub async fn mark_processing(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetails>, ApiError> {
    let batch = state.service.mark_as_processing(tenant, BatchId::from(id))?;
    Ok(Json(BatchDetails::from(&batch)))
}

/// Applies the operator's response to a sent batch
pub async fn process_response(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
    Json(request): Json<ProcessResponseRequest>,
) -> Result<Json<ProcessResponseResult>, ApiError> {
    request.validate()?;
    let response = BatchResponse::from(request);
    let (batch, outcome) = state
        .service
        .process_response(tenant, BatchId::from(id), &response)?;
    Ok(Json(ProcessResponseResult {
        batch: BatchDetails::from(&batch),
        outcome,
    }))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetails>, ApiError> {
    let batch = state.service.mark_as_paid(tenant, BatchId::from(id))?;
    Ok(Json(BatchDetails::from(&batch)))
}

/// Rejects a sent batch; the body is optional
pub async fn reject_batch(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Path(id): Path<Uuid>,
    request: Option<Json<RejectBatchRequest>>,
) -> Result<Json<BatchDetails>, ApiError> {
    let Json(request) = request.unwrap_or_default();
    request.validate()?;
    let batch = state
        .service
        .reject(tenant, BatchId::from(id), request.reason)?;
    Ok(Json(BatchDetails::from(&batch)))
}
