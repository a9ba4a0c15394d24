//! Claim batch aggregate root
//!
//! The batch groups guides bound for one insurance operator and is the only
//! way to change them once they are attached.
//!
//! # Invariants
//!
//! - Batch totals are always the sums over contained guides
//! - Guides are attached or detached only while the batch is `Draft`
//! - A recorded XML artifact always reflects the current guide set
//! - Submission requires a generated XML artifact
//!
//! # Batch Lifecycle
//!
//! ```text
//! Draft -> ReadyToSend -> Sent -> Processing -> Processed | PartiallyPaid | Rejected
//!                                                  |             |
//!                                                  +---> Paid <--+
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use core_kernel::{BatchId, ClinicId, GuideId, Money, OperatorId, percentage_of};
use crate::error::TissError;
use crate::guide::{ClaimGuide, GuideStatus};

/// Batch submission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Being assembled by clinic staff
    Draft,
    /// Closed for structural edits, waiting for submission
    ReadyToSend,
    /// Delivered to the operator, protocol number recorded
    Sent,
    /// Operator acknowledged receipt
    Processing,
    /// Response approved the full billed value
    Processed,
    /// Response approved part of the billed value
    PartiallyPaid,
    /// Nothing approved, or rejected outright by the operator
    Rejected,
    /// Settlement received
    Paid,
}

impl BatchStatus {
    /// Statuses in which the operator's response may still be applied
    pub fn awaits_response(&self) -> bool {
        matches!(self, BatchStatus::Sent | BatchStatus::Processing)
    }
}

/// A bundle of guides submitted together to one operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub id: BatchId,
    pub clinic_id: ClinicId,
    pub operator_id: OperatorId,
    /// Human-readable number, unique per tenant
    pub batch_number: String,
    guides: Vec<ClaimGuide>,
    status: BatchStatus,
    pub submitted_date: Option<DateTime<Utc>>,
    pub processed_date: Option<DateTime<Utc>>,
    pub protocol_number: Option<String>,
    xml_file_name: Option<String>,
    xml_file_path: Option<String>,
    /// Reference to the operator's response document
    pub response_document: Option<String>,
    /// Optimistic concurrency token, advanced by the repository on every store
    version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimBatch {
    /// Creates an empty draft batch
    pub fn new(
        clinic_id: ClinicId,
        operator_id: OperatorId,
        batch_number: impl Into<String>,
    ) -> Result<Self, TissError> {
        let batch_number = batch_number.into();
        if batch_number.trim().is_empty() {
            return Err(TissError::validation("Batch number is required"));
        }
        let now = Utc::now();

        Ok(Self {
            id: BatchId::new_v7(),
            clinic_id,
            operator_id,
            batch_number,
            guides: Vec::new(),
            status: BatchStatus::Draft,
            submitted_date: None,
            processed_date: None,
            protocol_number: None,
            xml_file_name: None,
            xml_file_path: None,
            response_document: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Called by repositories after a successful store
    pub fn advance_version(&mut self) {
        self.version += 1;
    }

    pub fn guides(&self) -> &[ClaimGuide] {
        &self.guides
    }

    pub fn guide(&self, guide_id: GuideId) -> Option<&ClaimGuide> {
        self.guides.iter().find(|g| g.id == guide_id)
    }

    pub fn guide_by_number(&self, guide_number: &str) -> Option<&ClaimGuide> {
        self.guides.iter().find(|g| g.guide_number == guide_number)
    }

    pub(crate) fn guide_by_number_mut(&mut self, guide_number: &str) -> Option<&mut ClaimGuide> {
        self.guides.iter_mut().find(|g| g.guide_number == guide_number)
    }

    pub fn xml_file_name(&self) -> Option<&str> {
        self.xml_file_name.as_deref()
    }

    pub fn xml_file_path(&self) -> Option<&str> {
        self.xml_file_path.as_deref()
    }

    pub fn has_xml(&self) -> bool {
        self.xml_file_name.is_some() && self.xml_file_path.is_some()
    }

    /// Sum of guide totals
    pub fn total_amount(&self) -> Money {
        self.guides.iter().map(|g| g.total_amount()).sum()
    }

    /// Sum of approved guide amounts
    pub fn approved_amount(&self) -> Money {
        self.guides.iter().filter_map(|g| g.approved_amount).sum()
    }

    /// Sum of glosed guide amounts
    pub fn glosed_amount(&self) -> Money {
        self.guides.iter().filter_map(|g| g.glosed_amount).sum()
    }

    /// Glosed share of the billed value, zero for an empty batch
    pub fn glosa_percentage(&self) -> Decimal {
        percentage_of(self.glosed_amount(), self.total_amount())
    }

    /// Attaches a guide while the batch is a draft
    pub fn add_guide(&mut self, mut guide: ClaimGuide) -> Result<(), TissError> {
        self.ensure_draft("add guide")?;
        if guide.status() != GuideStatus::Open {
            return Err(TissError::validation(format!(
                "Guide {} is {:?}; only open guides can be batched",
                guide.guide_number,
                guide.status()
            )));
        }
        if guide.batch_id.is_some_and(|owner| owner != self.id) {
            return Err(TissError::validation(format!(
                "Guide {} already belongs to another batch",
                guide.guide_number
            )));
        }
        if guide.procedures().is_empty() {
            return Err(TissError::validation(format!(
                "Guide {} has no procedures",
                guide.guide_number
            )));
        }
        if self.guide_by_number(&guide.guide_number).is_some() || self.guide(guide.id).is_some() {
            return Err(TissError::validation(format!(
                "Guide {} is already in batch {}",
                guide.guide_number, self.batch_number
            )));
        }

        guide.batch_id = Some(self.id);
        debug!(batch = %self.batch_number, guide = %guide.guide_number, "Guide attached");
        self.guides.push(guide);
        self.structure_changed();
        Ok(())
    }

    /// Detaches a guide while the batch is a draft
    pub fn remove_guide(&mut self, guide_id: GuideId) -> Result<ClaimGuide, TissError> {
        self.ensure_draft("remove guide")?;
        let index = self
            .guides
            .iter()
            .position(|g| g.id == guide_id)
            .ok_or_else(|| TissError::not_found("Guide", guide_id))?;
        let mut guide = self.guides.remove(index);
        guide.batch_id = None;
        debug!(batch = %self.batch_number, guide = %guide.guide_number, "Guide detached");
        self.structure_changed();
        Ok(guide)
    }

    /// `Draft -> ReadyToSend`; the batch must hold at least one submittable guide
    pub fn mark_as_ready_to_send(&mut self) -> Result<(), TissError> {
        self.ensure_transition(BatchStatus::ReadyToSend)?;
        if self.guides.is_empty() {
            return Err(TissError::validation("Batch must contain at least one guide"));
        }
        let issues: Vec<String> = self.guides.iter().flat_map(|g| g.submission_issues()).collect();
        if !issues.is_empty() {
            return Err(TissError::validation(issues.join("; ")));
        }
        self.set_status(BatchStatus::ReadyToSend);
        Ok(())
    }

    /// XML can only be (re)generated before the batch is submitted
    pub fn ensure_accepts_xml(&self) -> Result<(), TissError> {
        if !matches!(self.status, BatchStatus::Draft | BatchStatus::ReadyToSend) {
            return Err(TissError::validation(format!(
                "Cannot attach XML to batch {} in status {:?}",
                self.batch_number, self.status
            )));
        }
        Ok(())
    }

    /// Records the generated XML artifact without changing status
    pub fn record_xml(&mut self, file_name: impl Into<String>, file_path: impl Into<String>) -> Result<(), TissError> {
        self.ensure_accepts_xml()?;
        self.xml_file_name = Some(file_name.into());
        self.xml_file_path = Some(file_path.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `ReadyToSend -> Sent`; marks every guide as sent
    pub fn submit(&mut self, protocol_number: impl Into<String>) -> Result<(), TissError> {
        let protocol_number = protocol_number.into();
        self.ensure_transition(BatchStatus::Sent)?;
        if !self.has_xml() {
            return Err(TissError::validation(format!(
                "XML must be generated before submitting batch {}",
                self.batch_number
            )));
        }
        if protocol_number.trim().is_empty() {
            return Err(TissError::validation("Protocol number is required"));
        }

        let mut guides = self.guides.clone();
        for guide in guides.iter_mut() {
            guide.mark_as_sent()?;
        }
        self.guides = guides;
        self.protocol_number = Some(protocol_number);
        self.submitted_date = Some(Utc::now());
        self.set_status(BatchStatus::Sent);
        Ok(())
    }

    /// `Sent -> Processing`: the operator acknowledged receipt
    pub fn mark_as_processing(&mut self) -> Result<(), TissError> {
        self.ensure_transition(BatchStatus::Processing)?;
        self.set_status(BatchStatus::Processing);
        Ok(())
    }

    /// Status implied by the current guide sums
    pub fn outcome_from_totals(&self) -> BatchStatus {
        let total = self.total_amount();
        let approved = self.approved_amount();
        if approved == total {
            BatchStatus::Processed
        } else if approved.is_positive() && approved < total {
            BatchStatus::PartiallyPaid
        } else {
            BatchStatus::Rejected
        }
    }

    /// Closes response processing with the outcome derived from the guides
    pub(crate) fn complete_processing(&mut self, processed_at: DateTime<Utc>) -> Result<BatchStatus, TissError> {
        let outcome = self.outcome_from_totals();
        if !self.status.awaits_response() {
            return Err(TissError::transition("batch", self.status, outcome));
        }
        self.processed_date = Some(processed_at);
        self.set_status(outcome);
        Ok(outcome)
    }

    /// `Processed | PartiallyPaid -> Paid`; settles every approved guide
    pub fn mark_as_paid(&mut self) -> Result<(), TissError> {
        self.ensure_transition(BatchStatus::Paid)?;
        let mut guides = self.guides.clone();
        for guide in guides.iter_mut().filter(|g| g.is_settleable()) {
            guide.mark_as_paid()?;
        }
        self.guides = guides;
        self.set_status(BatchStatus::Paid);
        Ok(())
    }

    /// `Sent | Processing -> Rejected`: explicit rejection by the operator
    pub fn reject(&mut self, reason: Option<String>) -> Result<(), TissError> {
        self.ensure_transition(BatchStatus::Rejected)?;
        let mut guides = self.guides.clone();
        for guide in guides.iter_mut().filter(|g| g.status() == GuideStatus::Sent) {
            guide.reject(reason.clone())?;
        }
        self.guides = guides;
        self.processed_date = Some(Utc::now());
        self.set_status(BatchStatus::Rejected);
        Ok(())
    }

    fn ensure_draft(&self, action: &str) -> Result<(), TissError> {
        if self.status != BatchStatus::Draft {
            return Err(TissError::validation(format!(
                "Cannot {} on batch {} in status {:?}",
                action, self.batch_number, self.status
            )));
        }
        Ok(())
    }

    fn ensure_transition(&self, target: BatchStatus) -> Result<(), TissError> {
        if !self.can_transition_to(target) {
            return Err(TissError::transition("batch", self.status, target));
        }
        Ok(())
    }

    /// Checks if transition is valid
    fn can_transition_to(&self, target: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self.status, target),
            (Draft, ReadyToSend) |
            (ReadyToSend, Sent) |
            (Sent, Processing) |
            (Sent, Processed) |
            (Sent, PartiallyPaid) |
            (Sent, Rejected) |
            (Processing, Processed) |
            (Processing, PartiallyPaid) |
            (Processing, Rejected) |
            (Processed, Paid) |
            (PartiallyPaid, Paid)
        )
    }

    fn set_status(&mut self, status: BatchStatus) {
        info!(
            batch_id = %self.id,
            batch = %self.batch_number,
            from = ?self.status,
            to = ?status,
            "Batch status changed"
        );
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn structure_changed(&mut self) {
        self.xml_file_name = None;
        self.xml_file_path = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{AppointmentId, InsuranceId};
    use rust_decimal_macros::dec;
    use crate::guide::{Beneficiary, GuideType};

    fn guide(number: &str, value: Decimal) -> ClaimGuide {
        let mut guide = ClaimGuide::new(
            number,
            GuideType::Consultation,
            AppointmentId::new(),
            InsuranceId::new(),
            Beneficiary { card_number: "123".into(), name: "Paciente".into() },
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
        )
        .unwrap();
        guide.add_procedure("10101012", "Consulta", 1, Money::new(value)).unwrap();
        guide
    }

    fn draft() -> ClaimBatch {
        ClaimBatch::new(ClinicId::new(), OperatorId::new(), "LOTE-000001").unwrap()
    }

    #[test]
    fn test_totals_follow_guides() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        batch.add_guide(guide("G2", dec!(250.50))).unwrap();
        assert_eq!(batch.total_amount().amount(), dec!(350.50));

        let id = batch.guides()[0].id;
        let removed = batch.remove_guide(id).unwrap();
        assert!(removed.batch_id.is_none());
        assert_eq!(batch.total_amount().amount(), dec!(250.50));
    }

    #[test]
    fn test_duplicate_guide_number_rejected() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        assert!(batch.add_guide(guide("G1", dec!(50))).is_err());
    }

    #[test]
    fn test_ready_to_send_requires_guides() {
        let mut batch = draft();
        let err = batch.mark_as_ready_to_send().unwrap_err();
        assert!(err.to_string().contains("at least one guide"));
        assert_eq!(batch.status(), BatchStatus::Draft);
    }

    #[test]
    fn test_structural_edit_clears_xml() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        batch.record_xml("a.xml", "/tmp/a.xml").unwrap();
        assert!(batch.has_xml());
        batch.add_guide(guide("G2", dec!(100))).unwrap();
        assert!(!batch.has_xml());
    }

    #[test]
    fn test_submit_requires_xml() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        batch.mark_as_ready_to_send().unwrap();
        assert!(batch.submit("PROT-1").is_err());

        batch.record_xml("a.xml", "/tmp/a.xml").unwrap();
        batch.submit("PROT-1").unwrap();
        assert_eq!(batch.status(), BatchStatus::Sent);
        assert!(batch.submitted_date.is_some());
        assert!(batch.guides().iter().all(|g| g.status() == GuideStatus::Sent));
    }

    #[test]
    fn test_guides_locked_after_ready() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        batch.mark_as_ready_to_send().unwrap();
        assert!(batch.add_guide(guide("G2", dec!(1))).is_err());
        let id = batch.guides()[0].id;
        assert!(batch.remove_guide(id).is_err());
    }

    #[test]
    fn test_reject_marks_sent_guides() {
        let mut batch = draft();
        batch.add_guide(guide("G1", dec!(100))).unwrap();
        batch.mark_as_ready_to_send().unwrap();
        batch.record_xml("a.xml", "/tmp/a.xml").unwrap();
        batch.submit("P").unwrap();
        batch.mark_as_processing().unwrap();
        batch.reject(Some("Lote fora do prazo".into())).unwrap();

        assert_eq!(batch.status(), BatchStatus::Rejected);
        assert_eq!(batch.guides()[0].status(), GuideStatus::Rejected);
        assert_eq!(batch.glosa_percentage(), dec!(100));
    }

    #[test]
    fn test_reject_from_draft_fails() {
        let mut batch = draft();
        assert!(matches!(
            batch.reject(None),
            Err(TissError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_empty_batch_glosa_is_zero() {
        assert_eq!(draft().glosa_percentage(), Decimal::ZERO);
    }
}
