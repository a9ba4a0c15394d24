//! Test Data Builders
//!
//! Builders for guides and batches with sensible defaults. Tests set only
//! the fields they care about; [`TestBatchBuilder::in_status`] walks a batch
//! through the real lifecycle so every invariant still holds.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{ClinicId, Money, OperatorId};
use domain_tiss::{
    BatchResponse, BatchStatus, Beneficiary, ClaimBatch, ClaimGuide, GuideResponse, GuideType,
    ResponseReconciler,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{IdFixtures, MoneyFixtures, StringFixtures, TemporalFixtures};

/// One procedure line waiting to be added to a guide
#[derive(Debug, Clone)]
pub struct ProcedureLine {
    pub code: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Builder for constructing test guides
pub struct TestGuideBuilder {
    guide_number: String,
    guide_type: GuideType,
    service_date: NaiveDate,
    authorization_number: Option<String>,
    beneficiary: Beneficiary,
    procedures: Vec<ProcedureLine>,
}

impl TestGuideBuilder {
    /// A consultation guide with a single R$ 150,00 procedure
    pub fn new(guide_number: impl Into<String>) -> Self {
        Self {
            guide_number: guide_number.into(),
            guide_type: GuideType::Consultation,
            service_date: TemporalFixtures::service_date(),
            authorization_number: None,
            beneficiary: Beneficiary {
                card_number: StringFixtures::card_number().to_string(),
                name: "Joao da Silva".to_string(),
            },
            procedures: vec![ProcedureLine {
                code: StringFixtures::consultation_code().to_string(),
                description: "Consulta em consultorio".to_string(),
                quantity: 1,
                unit_price: MoneyFixtures::consultation_fee(),
            }],
        }
    }

    /// Sets the guide type; types that need one get an authorization number
    pub fn with_type(mut self, guide_type: GuideType) -> Self {
        self.guide_type = guide_type;
        if guide_type.requires_authorization() && self.authorization_number.is_none() {
            self.authorization_number = Some(format!("AUT-{}", self.guide_number));
        }
        self
    }

    pub fn with_service_date(mut self, date: NaiveDate) -> Self {
        self.service_date = date;
        self
    }

    pub fn with_authorization(mut self, number: impl Into<String>) -> Self {
        self.authorization_number = Some(number.into());
        self
    }

    pub fn without_authorization(mut self) -> Self {
        self.authorization_number = None;
        self
    }

    /// Replaces the default procedure with a single line of the given total
    pub fn with_total(mut self, total: Money) -> Self {
        self.procedures = vec![ProcedureLine {
            code: StringFixtures::consultation_code().to_string(),
            description: "Consulta em consultorio".to_string(),
            quantity: 1,
            unit_price: total,
        }];
        self
    }

    pub fn with_procedure(
        mut self,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        self.procedures.push(ProcedureLine {
            code: code.into(),
            description: description.into(),
            quantity,
            unit_price,
        });
        self
    }

    pub fn without_procedures(mut self) -> Self {
        self.procedures.clear();
        self
    }

    /// Builds the guide
    ///
    /// # Panics
    ///
    /// Panics if the configured data is rejected by the domain
    pub fn build(self) -> ClaimGuide {
        let mut guide = ClaimGuide::new(
            self.guide_number,
            self.guide_type,
            IdFixtures::appointment_id(),
            IdFixtures::insurance_id(),
            self.beneficiary,
            self.service_date,
        )
        .expect("valid test guide");
        if let Some(number) = self.authorization_number {
            guide = guide.with_authorization_number(number);
        }
        for line in self.procedures {
            guide
                .add_procedure(line.code, line.description, line.quantity, line.unit_price)
                .expect("valid test procedure");
        }
        guide
    }
}

/// Builder for constructing test batches in any lifecycle state
pub struct TestBatchBuilder {
    clinic_id: ClinicId,
    operator_id: OperatorId,
    batch_number: String,
    guides: Vec<ClaimGuide>,
    status: BatchStatus,
    protocol_number: String,
    glosa_fraction: Option<Decimal>,
    submitted_at: DateTime<Utc>,
    processed_at: DateTime<Utc>,
}

impl Default for TestBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBatchBuilder {
    pub fn new() -> Self {
        Self {
            clinic_id: IdFixtures::clinic_id(),
            operator_id: IdFixtures::operator_id(),
            batch_number: "LOTE-000001".to_string(),
            guides: Vec::new(),
            status: BatchStatus::Draft,
            protocol_number: StringFixtures::protocol_number().to_string(),
            glosa_fraction: None,
            submitted_at: TemporalFixtures::submitted_at(),
            processed_at: TemporalFixtures::processed_at(),
        }
    }

    pub fn with_clinic(mut self, clinic_id: ClinicId) -> Self {
        self.clinic_id = clinic_id;
        self
    }

    pub fn with_operator(mut self, operator_id: OperatorId) -> Self {
        self.operator_id = operator_id;
        self
    }

    pub fn with_batch_number(mut self, number: impl Into<String>) -> Self {
        self.batch_number = number.into();
        self
    }

    pub fn with_guide(mut self, guide: ClaimGuide) -> Self {
        self.guides.push(guide);
        self
    }

    /// Adds `count` default consultation guides numbered after the batch
    pub fn with_guides(mut self, count: usize) -> Self {
        let offset = self.guides.len();
        for i in 0..count {
            let number = format!("{}-G{:03}", self.batch_number, offset + i + 1);
            self.guides.push(TestGuideBuilder::new(number).build());
        }
        self
    }

    /// Adds one guide per total, numbered after the batch
    pub fn with_guide_totals(mut self, totals: &[Money]) -> Self {
        let offset = self.guides.len();
        for (i, total) in totals.iter().enumerate() {
            let number = format!("{}-G{:03}", self.batch_number, offset + i + 1);
            self.guides.push(TestGuideBuilder::new(number).with_total(*total).build());
        }
        self
    }

    /// Target lifecycle status reached by [`Self::build`]
    pub fn in_status(mut self, status: BatchStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol_number = protocol.into();
        self
    }

    /// Share of each guide glosed by the operator response, e.g. `dec!(0.2)`
    pub fn glosing(mut self, fraction: Decimal) -> Self {
        self.glosa_fraction = Some(fraction);
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    pub fn processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.processed_at = at;
        self
    }

    /// Response approving each guide minus the configured glosa fraction
    pub fn response_for(&self, batch: &ClaimBatch) -> BatchResponse {
        let fraction = self.glosa_fraction.unwrap_or(Decimal::ZERO);
        BatchResponse {
            protocol_number: self.protocol_number.clone(),
            response_document: Some(format!("RESP-{}", batch.batch_number)),
            guides: batch
                .guides()
                .iter()
                .map(|guide| {
                    let total = guide.total_amount();
                    let glosed = Money::new(total.amount() * fraction);
                    GuideResponse {
                        guide_number: guide.guide_number.clone(),
                        approved_amount: Some(total - glosed),
                        glosed_amount: Some(glosed),
                        gloss_reason: (!glosed.is_zero()).then(|| "Valor acima da tabela".to_string()),
                        procedures: Vec::new(),
                    }
                })
                .collect(),
        }
    }

    /// Builds the batch and drives it to the requested status
    ///
    /// `Processed` and `PartiallyPaid` go through the response reconciler;
    /// `PartiallyPaid` glosses 20% unless [`Self::glosing`] says otherwise.
    ///
    /// # Panics
    ///
    /// Panics if a lifecycle step is rejected by the domain
    pub fn build(mut self) -> ClaimBatch {
        if self.status == BatchStatus::PartiallyPaid && self.glosa_fraction.is_none() {
            self.glosa_fraction = Some(dec!(0.2));
        }
        let guides = std::mem::take(&mut self.guides);

        let mut batch = ClaimBatch::new(self.clinic_id, self.operator_id, self.batch_number.clone())
            .expect("valid test batch");
        for guide in guides {
            batch.add_guide(guide).expect("guide accepted by draft batch");
        }
        if self.status == BatchStatus::Draft {
            return batch;
        }

        batch.mark_as_ready_to_send().expect("batch ready to send");
        if self.status == BatchStatus::ReadyToSend {
            return batch;
        }

        let file_name = format!("TISS_{}_20240315100000.xml", batch.batch_number);
        let path = format!("memory://{}", file_name);
        batch.record_xml(file_name, path).expect("xml recorded");
        batch.submit(self.protocol_number.clone()).expect("batch submitted");
        batch.submitted_date = Some(self.submitted_at);
        if self.status == BatchStatus::Sent {
            return batch;
        }

        batch.mark_as_processing().expect("batch processing");
        match self.status {
            BatchStatus::Processing => batch,
            BatchStatus::Rejected => {
                batch.reject(Some("Lote rejeitado pela operadora".to_string()))
                    .expect("batch rejected");
                batch.processed_date = Some(self.processed_at);
                batch
            }
            target => {
                let response = self.response_for(&batch);
                ResponseReconciler::new()
                    .process_batch_response(&mut batch, &response, self.processed_at)
                    .expect("response applied");
                if target == BatchStatus::Paid {
                    ResponseReconciler::new()
                        .mark_as_paid(&mut batch)
                        .expect("batch paid");
                }
                batch
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_tiss::GuideStatus;

    #[test]
    fn test_default_guide() {
        let guide = TestGuideBuilder::new("G-1").build();
        assert_eq!(guide.total_amount(), MoneyFixtures::consultation_fee());
        assert_eq!(guide.status(), GuideStatus::Open);
    }

    #[test]
    fn test_sp_sadt_gets_authorization() {
        let guide = TestGuideBuilder::new("G-2").with_type(GuideType::SpSadt).build();
        assert_eq!(guide.authorization_number.as_deref(), Some("AUT-G-2"));
    }

    #[test]
    fn test_batch_reaches_each_status() {
        for status in [
            BatchStatus::Draft,
            BatchStatus::ReadyToSend,
            BatchStatus::Sent,
            BatchStatus::Processing,
            BatchStatus::Processed,
            BatchStatus::PartiallyPaid,
            BatchStatus::Rejected,
            BatchStatus::Paid,
        ] {
            let batch = TestBatchBuilder::new().with_guides(2).in_status(status).build();
            assert_eq!(batch.status(), status);
        }
    }

    #[test]
    fn test_partially_paid_glosses_twenty_percent() {
        let batch = TestBatchBuilder::new()
            .with_guide_totals(&[MoneyFixtures::thousand()])
            .in_status(BatchStatus::PartiallyPaid)
            .build();
        assert_eq!(batch.glosed_amount(), Money::new(dec!(200.00)));
        assert_eq!(batch.glosa_percentage(), dec!(20.00));
        assert_eq!(batch.processed_date, Some(TemporalFixtures::processed_at()));
    }
}
