//! Claim batch DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{AppointmentId, ClinicId, InsuranceId, Money, OperatorId, ProcedureId};
use domain_tiss::{
    BatchResponse, BatchStatus, Beneficiary, ClaimBatch, ClaimGuide, ClaimProcedure, GuideResponse,
    GuideStatus, GuideType, ProcedureResponse, ReconciliationOutcome, TissError, TissXmlDocument,
};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub clinic_id: Uuid,
    pub operator_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListBatchesQuery {
    pub clinic_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BeneficiaryRequest {
    #[validate(length(min = 1, max = 20, message = "card number must have 1 to 20 characters"))]
    pub card_number: String,
    #[validate(length(min = 1, max = 70))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ProcedureRequest {
    /// TUSS code
    #[validate(length(min = 1, max = 10))]
    pub code: String,
    #[validate(length(max = 150))]
    pub description: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddGuideRequest {
    #[validate(length(min = 1, max = 20))]
    pub guide_number: String,
    /// `CONSULTA`, `SP_SADT`, `EXAME`, `INTERNACAO` or `HONORARIOS`
    pub guide_type: String,
    pub appointment_id: Uuid,
    pub insurance_id: Uuid,
    pub service_date: NaiveDate,
    pub authorization_number: Option<String>,
    pub operator_guide_number: Option<String>,
    #[validate(nested)]
    pub beneficiary: BeneficiaryRequest,
    #[validate(length(min = 1, message = "a guide needs at least one procedure"), nested)]
    pub procedures: Vec<ProcedureRequest>,
}

impl AddGuideRequest {
    pub fn into_guide(self) -> Result<ClaimGuide, TissError> {
        let guide_type: GuideType = self.guide_type.parse()?;
        let beneficiary = Beneficiary {
            card_number: self.beneficiary.card_number,
            name: self.beneficiary.name,
        };

        let mut guide = ClaimGuide::new(
            self.guide_number,
            guide_type,
            AppointmentId::from(self.appointment_id),
            InsuranceId::from(self.insurance_id),
            beneficiary,
            self.service_date,
        )?;
        if let Some(number) = self.authorization_number {
            guide = guide.with_authorization_number(number);
        }
        guide.operator_guide_number = self.operator_guide_number;

        for procedure in self.procedures {
            guide.add_procedure(
                procedure.code,
                procedure.description,
                procedure.quantity,
                Money::new(procedure.unit_price),
            )?;
        }
        Ok(guide)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitBatchRequest {
    #[validate(length(min = 1, max = 40))]
    pub protocol_number: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectBatchRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ProcedureResponseRequest {
    pub procedure_id: Uuid,
    pub approved_amount: Option<Decimal>,
    pub glosed_amount: Option<Decimal>,
    pub gloss_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GuideResponseRequest {
    #[validate(length(min = 1))]
    pub guide_number: String,
    pub approved_amount: Option<Decimal>,
    pub glosed_amount: Option<Decimal>,
    pub gloss_reason: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub procedures: Vec<ProcedureResponseRequest>,
}

/// Operator response to a submitted batch
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ProcessResponseRequest {
    #[validate(length(min = 1, max = 40))]
    pub protocol_number: String,
    pub response_document: Option<String>,
    #[validate(length(min = 1, message = "the response must cover at least one guide"), nested)]
    pub guides: Vec<GuideResponseRequest>,
}

impl From<ProcessResponseRequest> for BatchResponse {
    fn from(request: ProcessResponseRequest) -> Self {
        BatchResponse {
            protocol_number: request.protocol_number,
            response_document: request.response_document,
            guides: request
                .guides
                .into_iter()
                .map(|guide| GuideResponse {
                    guide_number: guide.guide_number,
                    approved_amount: guide.approved_amount.map(Money::new),
                    glosed_amount: guide.glosed_amount.map(Money::new),
                    gloss_reason: guide.gloss_reason,
                    procedures: guide
                        .procedures
                        .into_iter()
                        .map(|procedure| ProcedureResponse {
                            procedure_id: ProcedureId::from(procedure.procedure_id),
                            approved_amount: procedure.approved_amount.map(Money::new),
                            glosed_amount: procedure.glosed_amount.map(Money::new),
                            gloss_reason: procedure.gloss_reason,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcedureSummary {
    pub id: ProcedureId,
    pub code: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
}

impl From<&ClaimProcedure> for ProcedureSummary {
    fn from(procedure: &ClaimProcedure) -> Self {
        Self {
            id: procedure.id,
            code: procedure.code.clone(),
            description: procedure.description.clone(),
            quantity: procedure.quantity,
            unit_price: procedure.unit_price,
            total_price: procedure.total_price(),
            approved_amount: procedure.approved_amount,
            glosed_amount: procedure.glosed_amount,
            gloss_reason: procedure.gloss_reason.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuideSummary {
    pub id: Uuid,
    pub guide_number: String,
    pub guide_type: String,
    pub status: GuideStatus,
    pub service_date: NaiveDate,
    pub authorization_number: Option<String>,
    pub beneficiary: Beneficiary,
    pub total_amount: Money,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
    pub procedures: Vec<ProcedureSummary>,
}

impl From<&ClaimGuide> for GuideSummary {
    fn from(guide: &ClaimGuide) -> Self {
        Self {
            id: *guide.id.as_uuid(),
            guide_number: guide.guide_number.clone(),
            guide_type: guide.guide_type.code().to_string(),
            status: guide.status(),
            service_date: guide.service_date,
            authorization_number: guide.authorization_number.clone(),
            beneficiary: guide.beneficiary.clone(),
            total_amount: guide.total_amount(),
            approved_amount: guide.approved_amount,
            glosed_amount: guide.glosed_amount,
            gloss_reason: guide.gloss_reason.clone(),
            procedures: guide.procedures().iter().map(ProcedureSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDetails {
    pub id: Uuid,
    pub batch_number: String,
    pub clinic_id: ClinicId,
    pub operator_id: OperatorId,
    pub status: BatchStatus,
    pub version: u64,
    pub guide_count: usize,
    pub total_amount: Money,
    pub approved_amount: Money,
    pub glosed_amount: Money,
    pub glosa_percentage: Decimal,
    pub protocol_number: Option<String>,
    pub response_document: Option<String>,
    pub xml_file_name: Option<String>,
    pub submitted_date: Option<DateTime<Utc>>,
    pub processed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub guides: Vec<GuideSummary>,
}

impl From<&ClaimBatch> for BatchDetails {
    fn from(batch: &ClaimBatch) -> Self {
        Self {
            id: *batch.id.as_uuid(),
            batch_number: batch.batch_number.clone(),
            clinic_id: batch.clinic_id,
            operator_id: batch.operator_id,
            status: batch.status(),
            version: batch.version(),
            guide_count: batch.guides().len(),
            total_amount: batch.total_amount(),
            approved_amount: batch.approved_amount(),
            glosed_amount: batch.glosed_amount(),
            glosa_percentage: batch.glosa_percentage(),
            protocol_number: batch.protocol_number.clone(),
            response_document: batch.response_document.clone(),
            xml_file_name: batch.xml_file_name().map(str::to_string),
            submitted_date: batch.submitted_date,
            processed_date: batch.processed_date,
            created_at: batch.created_at,
            updated_at: batch.updated_at,
            guides: batch.guides().iter().map(GuideSummary::from).collect(),
        }
    }
}

/// Generated XML together with the batch that now references it
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedXmlResponse {
    pub batch: BatchDetails,
    pub file_name: String,
    pub guide_count: usize,
    pub total_amount: Money,
    pub content: String,
}

impl GeneratedXmlResponse {
    pub fn new(batch: &ClaimBatch, document: TissXmlDocument) -> Self {
        Self {
            batch: BatchDetails::from(batch),
            file_name: document.file_name,
            guide_count: document.guide_count,
            total_amount: document.total_amount,
            content: document.content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponseResult {
    pub batch: BatchDetails,
    pub outcome: ReconciliationOutcome,
}
