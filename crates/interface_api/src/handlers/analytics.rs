//! Glosa analytics handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use validator::Validate;

use domain_tiss::analytics::{
    ApprovalTime, AuthorizationRate, GlosaAlert, GlosaSummary, MonthlyGlosa, MonthlyPerformance,
    OperatorGlosa, ProcedureGlosa,
};

use crate::dto::analytics::{PeriodQuery, WindowQuery};
use crate::middleware::Tenant;
use crate::{error::ApiError, AppState};

/// Billed, approved and glosed totals for the period
pub async fn glosa_summary(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<GlosaSummary>, ApiError> {
    let summary = state
        .service
        .glosa_summary(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(summary))
}

pub async fn glosas_by_operator(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<OperatorGlosa>>, ApiError> {
    let rows = state
        .service
        .glosas_by_operator(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(rows))
}

/// Month-by-month glosa over the trailing window
pub async fn glosa_trend(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<MonthlyGlosa>>, ApiError> {
    query.validate()?;
    let rows = state
        .service
        .glosa_trend(tenant, query.clinic_id(), query.today(), query.months())?;
    Ok(Json(rows))
}

/// Most glosed procedures
pub async fn procedure_glosas(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<ProcedureGlosa>>, ApiError> {
    let rows = state
        .service
        .procedure_glosas(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(rows))
}

pub async fn approval_time(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<ApprovalTime>>, ApiError> {
    let rows = state
        .service
        .approval_time_by_operator(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(rows))
}

pub async fn monthly_performance(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<MonthlyPerformance>>, ApiError> {
    query.validate()?;
    let rows = state
        .service
        .monthly_performance(tenant, query.clinic_id(), query.today(), query.months())?;
    Ok(Json(rows))
}

pub async fn glosa_alerts(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<GlosaAlert>>, ApiError> {
    let alerts = state
        .service
        .glosa_alerts(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(alerts))
}

/// Prior-authorization approval rate per operator
pub async fn authorization_rate(
    State(state): State<AppState>,
    Extension(Tenant(tenant)): Extension<Tenant>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<AuthorizationRate>>, ApiError> {
    let rows = state
        .service
        .authorization_rate(tenant, query.clinic_id(), query.period()?)?;
    Ok(Json(rows))
}
