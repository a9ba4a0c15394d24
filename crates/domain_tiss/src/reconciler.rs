//! Insurer response reconciliation
//!
//! Applies the operator's answer to a submitted batch: procedure overrides
//! first, then the guide-level decision (spread over the lines the operator
//! did not itemise), then the batch outcome derived from the aggregate sums.
//!
//! The response is applied to a working copy. The caller's batch is only
//! replaced when every entry succeeded, so a rejected response never leaves
//! a half-reconciled batch behind.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{Money, ProcedureId};
use crate::batch::{BatchStatus, ClaimBatch};
use crate::error::TissError;

/// Operator decision for one procedure line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureResponse {
    pub procedure_id: ProcedureId,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
}

/// Operator decision for one guide, matched by guide number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideResponse {
    pub guide_number: String,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
    #[serde(default)]
    pub procedures: Vec<ProcedureResponse>,
}

/// The operator's answer to a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub protocol_number: String,
    pub response_document: Option<String>,
    pub guides: Vec<GuideResponse>,
}

/// Result of applying a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub status: BatchStatus,
    pub total_amount: Money,
    pub approved_amount: Money,
    pub glosed_amount: Money,
    pub guides_processed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseReconciler;

impl ResponseReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Applies `response` to `batch`; on error `batch` is left untouched
    pub fn process_batch_response(
        &self,
        batch: &mut ClaimBatch,
        response: &BatchResponse,
        processed_at: DateTime<Utc>,
    ) -> Result<ReconciliationOutcome, TissError> {
        if !batch.status().awaits_response() {
            return Err(TissError::validation(format!(
                "Batch {} is {:?} and cannot receive a response",
                batch.batch_number,
                batch.status()
            )));
        }
        self.check_references(batch, response)?;

        let mut working = batch.clone();
        for entry in &response.guides {
            let guide = working
                .guide_by_number_mut(&entry.guide_number)
                .ok_or_else(|| TissError::not_found("Guide", &entry.guide_number))?;
            let mut itemised = HashSet::new();
            for override_ in &entry.procedures {
                let procedure = guide
                    .procedure_mut(override_.procedure_id)
                    .ok_or_else(|| TissError::not_found("Procedure", override_.procedure_id))?;
                procedure.apply_override(
                    override_.approved_amount,
                    override_.glosed_amount,
                    override_.gloss_reason.clone(),
                )?;
                itemised.insert(override_.procedure_id);
            }
            guide.approve(entry.approved_amount, entry.glosed_amount, entry.gloss_reason.clone())?;
            guide.allocate_to_procedures(&itemised)?;
        }

        if let Some(document) = &response.response_document {
            working.response_document = Some(document.clone());
        }
        let status = working.complete_processing(processed_at)?;
        let outcome = ReconciliationOutcome {
            status,
            total_amount: working.total_amount(),
            approved_amount: working.approved_amount(),
            glosed_amount: working.glosed_amount(),
            guides_processed: response.guides.len(),
        };
        *batch = working;

        info!(
            batch_id = %batch.id,
            status = ?outcome.status,
            approved = %outcome.approved_amount,
            glosed = %outcome.glosed_amount,
            "Batch response reconciled"
        );
        Ok(outcome)
    }

    /// Settles a processed batch and its approved guides
    pub fn mark_as_paid(&self, batch: &mut ClaimBatch) -> Result<(), TissError> {
        batch.mark_as_paid()
    }

    /// Every reference in the response must resolve before anything is applied
    fn check_references(&self, batch: &ClaimBatch, response: &BatchResponse) -> Result<(), TissError> {
        if let Some(recorded) = &batch.protocol_number {
            if recorded != &response.protocol_number {
                warn!(batch_id = %batch.id, expected = %recorded, received = %response.protocol_number, "Protocol mismatch");
                return Err(TissError::Reconciliation {
                    message: format!(
                        "Response protocol {} does not match batch protocol {}",
                        response.protocol_number, recorded
                    ),
                    unmatched_guides: Vec::new(),
                    unmatched_procedures: Vec::new(),
                });
            }
        }

        let mut seen = HashSet::new();
        let duplicates: Vec<String> = response
            .guides
            .iter()
            .filter(|g| !seen.insert(g.guide_number.as_str()))
            .map(|g| g.guide_number.clone())
            .collect();
        if !duplicates.is_empty() {
            return Err(TissError::Reconciliation {
                message: format!("Duplicate guide entries in response: {}", duplicates.join(", ")),
                unmatched_guides: Vec::new(),
                unmatched_procedures: Vec::new(),
            });
        }

        let mut unmatched_guides = Vec::new();
        let mut unmatched_procedures = Vec::new();
        for entry in &response.guides {
            match batch.guide_by_number(&entry.guide_number) {
                None => unmatched_guides.push(entry.guide_number.clone()),
                Some(guide) => unmatched_procedures.extend(
                    entry
                        .procedures
                        .iter()
                        .filter(|p| guide.procedure(p.procedure_id).is_none())
                        .map(|p| p.procedure_id.to_string()),
                ),
            }
        }
        if unmatched_guides.is_empty() && unmatched_procedures.is_empty() {
            return Ok(());
        }

        warn!(
            batch_id = %batch.id,
            guides = ?unmatched_guides,
            procedures = ?unmatched_procedures,
            "Response references unknown entries"
        );
        Err(TissError::Reconciliation {
            message: format!(
                "{} unmatched guide(s) and {} unmatched procedure(s) in response for batch {}",
                unmatched_guides.len(),
                unmatched_procedures.len(),
                batch.batch_number
            ),
            unmatched_guides,
            unmatched_procedures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{AppointmentId, ClinicId, InsuranceId, OperatorId};
    use rust_decimal_macros::dec;
    use crate::guide::{Beneficiary, ClaimGuide, GuideStatus, GuideType};

    fn sent_batch(values: &[rust_decimal::Decimal]) -> ClaimBatch {
        let mut batch = ClaimBatch::new(ClinicId::new(), OperatorId::new(), "LOTE-000001").unwrap();
        for (i, value) in values.iter().enumerate() {
            let mut guide = ClaimGuide::new(
                format!("G{}", i + 1),
                GuideType::Consultation,
                AppointmentId::new(),
                InsuranceId::new(),
                Beneficiary { card_number: "1".into(), name: "P".into() },
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .unwrap();
            guide.add_procedure("10101012", "Consulta", 1, Money::new(*value)).unwrap();
            batch.add_guide(guide).unwrap();
        }
        batch.mark_as_ready_to_send().unwrap();
        batch.record_xml("a.xml", "memory://a.xml").unwrap();
        batch.submit("PROT-1").unwrap();
        batch
    }

    fn entry(number: &str, approved: Option<rust_decimal::Decimal>, glosed: Option<rust_decimal::Decimal>) -> GuideResponse {
        GuideResponse {
            guide_number: number.into(),
            approved_amount: approved.map(Money::new),
            glosed_amount: glosed.map(Money::new),
            gloss_reason: None,
            procedures: Vec::new(),
        }
    }

    fn response(guides: Vec<GuideResponse>) -> BatchResponse {
        BatchResponse { protocol_number: "PROT-1".into(), response_document: Some("resp.xml".into()), guides }
    }

    #[test]
    fn test_full_approval_processes_batch() {
        let mut batch = sent_batch(&[dec!(100)]);
        let outcome = ResponseReconciler::new()
            .process_batch_response(&mut batch, &response(vec![entry("G1", Some(dec!(100)), Some(dec!(0)))]), Utc::now())
            .unwrap();
        assert_eq!(outcome.status, BatchStatus::Processed);
        assert_eq!(batch.guides()[0].status(), GuideStatus::Approved);
        assert_eq!(batch.response_document.as_deref(), Some("resp.xml"));
        assert!(batch.processed_date.is_some());
    }

    #[test]
    fn test_partial_approval() {
        let mut batch = sent_batch(&[dec!(100), dec!(100)]);
        let outcome = ResponseReconciler::new()
            .process_batch_response(
                &mut batch,
                &response(vec![entry("G1", Some(dec!(100)), None), entry("G2", Some(dec!(40)), None)]),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(outcome.status, BatchStatus::PartiallyPaid);
        assert_eq!(outcome.glosed_amount, Money::new(dec!(60)));
        assert_eq!(batch.guides()[1].status(), GuideStatus::PartiallyApproved);
    }

    #[test]
    fn test_guide_level_decision_reaches_procedures() {
        let mut batch = sent_batch(&[dec!(1000)]);
        ResponseReconciler::new()
            .process_batch_response(&mut batch, &response(vec![entry("G1", Some(dec!(800)), None)]), Utc::now())
            .unwrap();
        let procedure = &batch.guides()[0].procedures()[0];
        assert_eq!(procedure.approved_amount, Some(Money::new(dec!(800))));
        assert_eq!(procedure.glosed_amount, Some(Money::new(dec!(200))));
    }

    #[test]
    fn test_unknown_guide_leaves_batch_untouched() {
        let mut batch = sent_batch(&[dec!(100)]);
        let err = ResponseReconciler::new()
            .process_batch_response(
                &mut batch,
                &response(vec![entry("G1", Some(dec!(100)), None), entry("G9", Some(dec!(1)), None)]),
                Utc::now(),
            )
            .unwrap_err();
        match err {
            TissError::Reconciliation { unmatched_guides, .. } => assert_eq!(unmatched_guides, vec!["G9"]),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(batch.status(), BatchStatus::Sent);
        assert_eq!(batch.guides()[0].status(), GuideStatus::Sent);
    }

    #[test]
    fn test_invalid_amount_rolls_back() {
        let mut batch = sent_batch(&[dec!(100), dec!(50)]);
        let result = ResponseReconciler::new().process_batch_response(
            &mut batch,
            &response(vec![entry("G1", Some(dec!(100)), None), entry("G2", Some(dec!(80)), None)]),
            Utc::now(),
        );
        assert!(result.is_err());
        assert!(batch.guides().iter().all(|g| g.status() == GuideStatus::Sent));
    }

    #[test]
    fn test_protocol_mismatch() {
        let mut batch = sent_batch(&[dec!(100)]);
        let mut resp = response(vec![entry("G1", Some(dec!(100)), None)]);
        resp.protocol_number = "OTHER".into();
        assert!(matches!(
            ResponseReconciler::new().process_batch_response(&mut batch, &resp, Utc::now()),
            Err(TissError::Reconciliation { .. })
        ));
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let mut batch = sent_batch(&[dec!(100)]);
        let resp = response(vec![entry("G1", Some(dec!(100)), None), entry("G1", Some(dec!(10)), None)]);
        assert!(ResponseReconciler::new().process_batch_response(&mut batch, &resp, Utc::now()).is_err());
    }

    #[test]
    fn test_procedure_override_is_clamped() {
        let mut batch = sent_batch(&[dec!(100)]);
        let procedure_id = batch.guides()[0].procedures()[0].id;
        let mut guide_entry = entry("G1", Some(dec!(70)), None);
        guide_entry.procedures.push(ProcedureResponse {
            procedure_id,
            approved_amount: Some(Money::new(dec!(500))),
            glosed_amount: None,
            gloss_reason: Some("Glosa parcial".into()),
        });
        ResponseReconciler::new()
            .process_batch_response(&mut batch, &response(vec![guide_entry]), Utc::now())
            .unwrap();
        let procedure = &batch.guides()[0].procedures()[0];
        assert_eq!(procedure.approved_amount, Some(Money::new(dec!(100))));
    }

    #[test]
    fn test_mark_as_paid_settles_guides() {
        let mut batch = sent_batch(&[dec!(100), dec!(100)]);
        let reconciler = ResponseReconciler::new();
        reconciler
            .process_batch_response(&mut batch, &response(vec![entry("G1", Some(dec!(100)), None), entry("G2", None, None)]), Utc::now())
            .unwrap();
        assert_eq!(batch.status(), BatchStatus::PartiallyPaid);
        reconciler.mark_as_paid(&mut batch).unwrap();
        assert_eq!(batch.status(), BatchStatus::Paid);
        assert_eq!(batch.guides()[0].status(), GuideStatus::Paid);
        assert_eq!(batch.guides()[1].status(), GuideStatus::Rejected);
    }
}
