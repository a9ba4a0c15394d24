//! Prior-authorization requests
//!
//! A separate stream from claim batches: clinics ask the operator for
//! permission before performing some procedures. Only the fields needed for
//! approval-rate analytics are modelled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AuthorizationRequestId, ClinicId, InsuranceId, OperatorId};

/// Operator decision on an authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub id: AuthorizationRequestId,
    pub clinic_id: ClinicId,
    /// Patient insurance the request was filed under, once resolved
    pub insurance_id: Option<InsuranceId>,
    /// Operator behind the insurance, once resolved
    pub operator_id: Option<OperatorId>,
    pub procedure_code: String,
    pub status: AuthorizationStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AuthorizationRequest {
    pub fn new(
        clinic_id: ClinicId,
        insurance_id: Option<InsuranceId>,
        operator_id: Option<OperatorId>,
        procedure_code: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuthorizationRequestId::new_v7(),
            clinic_id,
            insurance_id,
            operator_id,
            procedure_code: procedure_code.into(),
            status: AuthorizationStatus::Pending,
            requested_at,
            resolved_at: None,
        }
    }

    /// Records the operator decision
    pub fn resolve(mut self, status: AuthorizationStatus, at: DateTime<Utc>) -> Self {
        self.status = status;
        self.resolved_at = Some(at);
        self
    }

    pub fn is_approved(&self) -> bool {
        self.status == AuthorizationStatus::Approved
    }

    /// The operator this request counts toward, if its insurance was resolved
    pub fn resolved_operator(&self) -> Option<OperatorId> {
        self.insurance_id.and(self.operator_id)
    }
}
