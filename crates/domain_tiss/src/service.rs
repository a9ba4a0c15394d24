//! TISS application service
//!
//! Tenant-scoped entry points used by the API layer. Every mutating
//! operation loads the batch, changes it through the aggregate and stores
//! it with [`BatchRepository::compare_and_set`] against the status and
//! version it was loaded with. A concurrent writer makes the second store
//! fail with [`TissError::ConcurrencyConflict`] instead of merging.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};

use core_kernel::{
    BatchId, ClinicId, DateRange, GuideId, OperatorId, PortError, TenantId,
};
use crate::analytics::{
    ApprovalTime, AuthorizationRate, ClaimsAnalytics, GlosaAlert, GlosaSummary, MonthlyGlosa,
    MonthlyPerformance, OperatorGlosa, ProcedureGlosa,
};
use crate::batch::{BatchStatus, ClaimBatch};
use crate::codec::{TissCodec, TissXmlDocument, XmlValidationResult};
use crate::error::TissError;
use crate::guide::ClaimGuide;
use crate::ports::{
    AuthorizationRequestSource, BatchRepository, ClinicLookup, FileStore, OperatorLookup,
};
use crate::reconciler::{BatchResponse, ReconciliationOutcome, ResponseReconciler};

/// Collaborators injected into [`TissService`]
#[derive(Clone)]
pub struct TissPorts {
    pub batches: Arc<dyn BatchRepository>,
    pub clinics: Arc<dyn ClinicLookup>,
    pub operators: Arc<dyn OperatorLookup>,
    pub files: Arc<dyn FileStore>,
    pub authorizations: Arc<dyn AuthorizationRequestSource>,
}

pub struct TissService {
    ports: TissPorts,
    codec: TissCodec,
    reconciler: ResponseReconciler,
    analytics: ClaimsAnalytics,
}

impl TissService {
    pub fn new(ports: TissPorts, codec: TissCodec, analytics: ClaimsAnalytics) -> Self {
        Self {
            ports,
            codec,
            reconciler: ResponseReconciler::new(),
            analytics,
        }
    }

    pub fn codec(&self) -> &TissCodec {
        &self.codec
    }

    // ========================================================================
    // Batch lifecycle
    // ========================================================================

    /// Creates an empty draft batch with the tenant's next batch number
    #[instrument(skip_all, fields(tenant = %tenant, clinic_id = %clinic_id))]
    pub fn create_batch(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        operator_id: OperatorId,
    ) -> Result<ClaimBatch, TissError> {
        self.ports.clinics.get_clinic(tenant, clinic_id)?;
        self.ports.operators.get_operator(tenant, operator_id)?;

        let number = self.ports.batches.next_batch_number(tenant)?;
        let batch = ClaimBatch::new(clinic_id, operator_id, number)?;
        let stored = self.ports.batches.insert(tenant, &batch)?;
        info!(batch_id = %stored.id, batch = %stored.batch_number, "Batch created");
        Ok(stored)
    }

    pub fn get_batch(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, TissError> {
        Ok(self.load(tenant, batch_id)?)
    }

    pub fn list_batches(&self, tenant: TenantId, clinic_id: ClinicId) -> Result<Vec<ClaimBatch>, TissError> {
        Ok(self.ports.batches.list_by_clinic(tenant, clinic_id)?)
    }

    /// Attaches a guide; its number must be unused across the tenant.
    ///
    /// The lookup gives an early answer. The repository enforces the rule
    /// again when the batch is stored, so concurrent callers cannot both win.
    #[instrument(skip_all, fields(tenant = %tenant, batch_id = %batch_id, guide = %guide.guide_number))]
    pub fn add_guide(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        guide: ClaimGuide,
    ) -> Result<ClaimBatch, TissError> {
        if let Some(owner) = self.ports.batches.find_batch_by_guide_number(tenant, &guide.guide_number)? {
            warn!(guide = %guide.guide_number, owner = %owner, "Guide number already used");
            return Err(TissError::validation(format!(
                "Guide number {} is already used in batch {}",
                guide.guide_number, owner
            )));
        }
        self.update(tenant, batch_id, |batch| batch.add_guide(guide))
    }

    pub fn remove_guide(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        guide_id: GuideId,
    ) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| batch.remove_guide(guide_id).map(|_| ()))
    }

    /// Renders, validates and stores the batch XML, then records the artifact.
    ///
    /// Nothing is recorded on the batch unless every step succeeds, and a
    /// submitted batch is refused before anything reaches the file store.
    #[instrument(skip_all, fields(tenant = %tenant, batch_id = %batch_id))]
    pub fn generate_xml(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
    ) -> Result<(ClaimBatch, TissXmlDocument), TissError> {
        let mut batch = self.load(tenant, batch_id)?;
        batch.ensure_accepts_xml()?;
        let clinic = self.ports.clinics.get_clinic(tenant, batch.clinic_id)?;
        let operator = self.ports.operators.get_operator(tenant, batch.operator_id)?;

        let document = self.codec.generate(&batch, &clinic, &operator)?;
        let validation = self.codec.validate_structure(&document.content);
        if !validation.is_valid {
            return Err(TissError::codec(format!(
                "Generated XML failed structural validation: {}",
                validation.errors.join("; ")
            )));
        }

        let path = self.ports.files.save(document.as_bytes(), &document.file_name)?;
        let (status, version) = (batch.status(), batch.version());
        batch.record_xml(document.file_name.clone(), path)?;
        let stored = self.store(tenant, &batch, status, version)?;
        info!(file = %document.file_name, guides = document.guide_count, "Batch XML generated");
        Ok((stored, document))
    }

    /// Structural check of an externally supplied document
    pub fn validate_xml(&self, xml: &str) -> XmlValidationResult {
        self.codec.validate_structure(xml)
    }

    pub fn mark_ready_to_send(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| batch.mark_as_ready_to_send())
    }

    pub fn submit(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        protocol_number: String,
    ) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| batch.submit(protocol_number))
    }

    pub fn mark_as_processing(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| batch.mark_as_processing())
    }

    /// Applies the operator response; a concurrent delivery fails with a conflict
    #[instrument(skip_all, fields(tenant = %tenant, batch_id = %batch_id))]
    pub fn process_response(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        response: &BatchResponse,
    ) -> Result<(ClaimBatch, ReconciliationOutcome), TissError> {
        let mut batch = self.load(tenant, batch_id)?;
        let (status, version) = (batch.status(), batch.version());
        let outcome = self
            .reconciler
            .process_batch_response(&mut batch, response, Utc::now())?;
        let stored = self.store(tenant, &batch, status, version)?;
        Ok((stored, outcome))
    }

    pub fn mark_as_paid(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| self.reconciler.mark_as_paid(batch))
    }

    pub fn reject(
        &self,
        tenant: TenantId,
        batch_id: BatchId,
        reason: Option<String>,
    ) -> Result<ClaimBatch, TissError> {
        self.update(tenant, batch_id, |batch| batch.reject(reason))
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    pub fn glosa_summary(&self, tenant: TenantId, clinic_id: ClinicId, period: DateRange) -> Result<GlosaSummary, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.glosa_summary(&batches, period))
    }

    pub fn glosas_by_operator(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        period: DateRange,
    ) -> Result<Vec<OperatorGlosa>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.glosas_by_operator(tenant, &batches, period))
    }

    pub fn glosa_trend(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        today: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyGlosa>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.glosa_trend(&batches, today, months))
    }

    pub fn procedure_glosas(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        period: DateRange,
    ) -> Result<Vec<ProcedureGlosa>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.procedure_glosas(&batches, period))
    }

    pub fn approval_time_by_operator(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        period: DateRange,
    ) -> Result<Vec<ApprovalTime>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.approval_time_by_operator(tenant, &batches, period))
    }

    pub fn monthly_performance(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        today: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyPerformance>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.monthly_performance(&batches, today, months))
    }

    pub fn glosa_alerts(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        period: DateRange,
    ) -> Result<Vec<GlosaAlert>, TissError> {
        let batches = self.list_batches(tenant, clinic_id)?;
        Ok(self.analytics.glosa_alerts(tenant, &batches, period))
    }

    pub fn authorization_rate(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
        period: DateRange,
    ) -> Result<Vec<AuthorizationRate>, TissError> {
        let requests = self.ports.authorizations.list_by_clinic(tenant, clinic_id)?;
        Ok(self.analytics.authorization_rate(tenant, &requests, period))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn load(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, PortError> {
        self.ports.batches.get(tenant, batch_id)
    }

    /// Load, mutate, compare-and-set
    fn update<F>(&self, tenant: TenantId, batch_id: BatchId, mutate: F) -> Result<ClaimBatch, TissError>
    where
        F: FnOnce(&mut ClaimBatch) -> Result<(), TissError>,
    {
        let mut batch = self.load(tenant, batch_id)?;
        let (status, version) = (batch.status(), batch.version());
        if let Err(e) = mutate(&mut batch) {
            warn!(tenant = %tenant, batch_id = %batch_id, error = %e, "Batch operation rejected");
            return Err(e);
        }
        self.store(tenant, &batch, status, version)
    }

    fn store(
        &self,
        tenant: TenantId,
        batch: &ClaimBatch,
        expected_status: BatchStatus,
        expected_version: u64,
    ) -> Result<ClaimBatch, TissError> {
        self.ports
            .batches
            .compare_and_set(tenant, batch, expected_status, expected_version)
            .map_err(|e| match e {
                PortError::Conflict { .. } => {
                    warn!(tenant = %tenant, batch_id = %batch.id, "Concurrent batch update rejected");
                    TissError::ConcurrencyConflict {
                        batch_id: batch.id.to_string(),
                        expected: format!("{:?}", expected_status),
                    }
                }
                PortError::Validation { message } => {
                    warn!(tenant = %tenant, batch_id = %batch.id, reason = %message, "Batch store rejected");
                    TissError::Validation(message)
                }
                other => TissError::Port(other),
            })
    }
}
