//! Claim guide - one billable claim
//!
//! # Guide Lifecycle
//!
//! ```text
//! Open -> Sent -> Approved | PartiallyApproved | Rejected -> Paid
//! ```
//!
//! Procedures can only change while the guide is `Open`. A guide becomes
//! `Sent` only when the batch that owns it is submitted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use core_kernel::{AppointmentId, BatchId, GuideId, InsuranceId, Money, ProcedureId, percentage_of};
use crate::error::TissError;
use crate::procedure::ClaimProcedure;

/// Guide status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuideStatus {
    /// Being assembled, procedures may change
    Open,
    /// Submitted to the operator inside a batch
    Sent,
    /// Paid in full by the operator's response
    Approved,
    /// Some of the billed value was glosed
    PartiallyApproved,
    /// Nothing approved
    Rejected,
    /// Settlement received
    Paid,
}

/// Kind of TISS guide
///
/// Each variant decides the wire element it is rendered as and the sections
/// that element must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuideType {
    Consultation,
    SpSadt,
    /// Exams travel as SP/SADT guides with their own service type
    Exam,
    Hospitalization,
    Fees,
}

/// Sections every guide element must contain
pub const COMMON_GUIDE_SECTIONS: [&str; 2] = ["cabecalhoGuia", "dadosBeneficiario"];

impl GuideType {
    pub const ALL: [GuideType; 5] = [
        GuideType::Consultation,
        GuideType::SpSadt,
        GuideType::Exam,
        GuideType::Hospitalization,
        GuideType::Fees,
    ];

    /// Wire element name inside `<guias>`
    pub fn element_name(&self) -> &'static str {
        match self {
            GuideType::Consultation => "guiaConsulta",
            GuideType::SpSadt | GuideType::Exam => "guiaSP-SADT",
            GuideType::Hospitalization => "guiaResumoInternacao",
            GuideType::Fees => "guiaHonorarios",
        }
    }

    /// Sections required by this variant beyond [`COMMON_GUIDE_SECTIONS`]
    pub fn variant_sections(&self) -> &'static [&'static str] {
        match self {
            GuideType::Consultation => &["dadosAtendimento"],
            GuideType::SpSadt | GuideType::Exam => &["dadosSolicitacao", "procedimentosExecutados"],
            GuideType::Hospitalization => &["dadosInternacao", "procedimentosExecutados"],
            GuideType::Fees => &["procedimentosExecutados"],
        }
    }

    /// All sections the wire element must contain
    pub fn required_sections(&self) -> Vec<&'static str> {
        COMMON_GUIDE_SECTIONS
            .iter()
            .chain(self.variant_sections())
            .copied()
            .collect()
    }

    /// `tipoAtendimento` code rendered in the guide
    pub fn service_type_code(&self) -> &'static str {
        match self {
            GuideType::Consultation => "04",
            GuideType::SpSadt => "05",
            GuideType::Exam => "23",
            GuideType::Hospitalization => "07",
            GuideType::Fees => "11",
        }
    }

    pub fn requires_authorization(&self) -> bool {
        matches!(self, GuideType::SpSadt | GuideType::Hospitalization)
    }

    /// Stable code used by callers
    pub fn code(&self) -> &'static str {
        match self {
            GuideType::Consultation => "CONSULTA",
            GuideType::SpSadt => "SP_SADT",
            GuideType::Exam => "EXAME",
            GuideType::Hospitalization => "INTERNACAO",
            GuideType::Fees => "HONORARIOS",
        }
    }

    /// Returns the guide types rendered under a wire element name
    pub fn from_element_name(name: &str) -> Vec<GuideType> {
        Self::ALL
            .into_iter()
            .filter(|t| t.element_name() == name)
            .collect()
    }
}

impl fmt::Display for GuideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GuideType {
    type Err = TissError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONSULTA" | "CONSULTATION" => Ok(GuideType::Consultation),
            "SP_SADT" | "SPSADT" | "SP-SADT" => Ok(GuideType::SpSadt),
            "EXAME" | "EXAM" => Ok(GuideType::Exam),
            "INTERNACAO" | "HOSPITALIZATION" => Ok(GuideType::Hospitalization),
            "HONORARIOS" | "FEES" => Ok(GuideType::Fees),
            _ => Err(TissError::validation(format!("Invalid guide type: {}", s))),
        }
    }
}

/// Beneficiary data rendered in `dadosBeneficiario`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    /// Insurance card number
    pub card_number: String,
    pub name: String,
}

/// One billable claim tied to an appointment and an insurance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimGuide {
    pub id: GuideId,
    /// Owning batch, set when the guide is attached
    pub batch_id: Option<BatchId>,
    pub appointment_id: AppointmentId,
    pub insurance_id: InsuranceId,
    /// Provider-side guide number, unique per tenant
    pub guide_number: String,
    /// Number assigned by the operator, when known
    pub operator_guide_number: Option<String>,
    pub guide_type: GuideType,
    pub service_date: NaiveDate,
    pub authorization_number: Option<String>,
    pub beneficiary: Beneficiary,
    procedures: Vec<ClaimProcedure>,
    total_amount: Money,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
    status: GuideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimGuide {
    /// Creates an open guide with no procedures
    pub fn new(
        guide_number: impl Into<String>,
        guide_type: GuideType,
        appointment_id: AppointmentId,
        insurance_id: InsuranceId,
        beneficiary: Beneficiary,
        service_date: NaiveDate,
    ) -> Result<Self, TissError> {
        let guide_number = guide_number.into();
        if guide_number.trim().is_empty() {
            return Err(TissError::validation("Guide number is required"));
        }
        if beneficiary.card_number.trim().is_empty() {
            return Err(TissError::validation("Beneficiary card number is required"));
        }
        let now = Utc::now();

        Ok(Self {
            id: GuideId::new_v7(),
            batch_id: None,
            appointment_id,
            insurance_id,
            guide_number,
            operator_guide_number: None,
            guide_type,
            service_date,
            authorization_number: None,
            beneficiary,
            procedures: Vec::new(),
            total_amount: Money::zero(),
            approved_amount: None,
            glosed_amount: None,
            gloss_reason: None,
            status: GuideStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets the prior-authorization number
    pub fn with_authorization_number(mut self, number: impl Into<String>) -> Self {
        self.authorization_number = Some(number.into());
        self
    }

    pub fn status(&self) -> GuideStatus {
        self.status
    }

    pub fn procedures(&self) -> &[ClaimProcedure] {
        &self.procedures
    }

    /// Sum of procedure totals
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Adds a procedure line while the guide is open
    pub fn add_procedure(
        &mut self,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<ProcedureId, TissError> {
        self.ensure_open("add procedure")?;
        let procedure = ClaimProcedure::new(self.id, code, description, quantity, unit_price)?;
        let id = procedure.id;
        self.procedures.push(procedure);
        self.recalculate_total();
        Ok(id)
    }

    /// Removes a procedure line while the guide is open
    pub fn remove_procedure(&mut self, procedure_id: ProcedureId) -> Result<ClaimProcedure, TissError> {
        self.ensure_open("remove procedure")?;
        let index = self
            .procedures
            .iter()
            .position(|p| p.id == procedure_id)
            .ok_or_else(|| TissError::not_found("Procedure", procedure_id))?;
        let removed = self.procedures.remove(index);
        self.recalculate_total();
        Ok(removed)
    }

    pub fn procedure(&self, procedure_id: ProcedureId) -> Option<&ClaimProcedure> {
        self.procedures.iter().find(|p| p.id == procedure_id)
    }

    pub(crate) fn procedure_mut(&mut self, procedure_id: ProcedureId) -> Option<&mut ClaimProcedure> {
        self.procedures.iter_mut().find(|p| p.id == procedure_id)
    }

    /// Problems that keep the guide out of a ready-to-send batch
    pub fn submission_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.procedures.is_empty() {
            issues.push(format!("Guide {} has no procedures", self.guide_number));
        }
        if self.guide_type.requires_authorization()
            && self.authorization_number.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            issues.push(format!(
                "Guide {} of type {} requires an authorization number",
                self.guide_number, self.guide_type
            ));
        }
        issues
    }

    /// `Open -> Sent`. Only the owning batch calls this, when it is submitted.
    pub(crate) fn mark_as_sent(&mut self) -> Result<(), TissError> {
        if self.batch_id.is_none() {
            return Err(TissError::validation(format!(
                "Guide {} does not belong to a batch",
                self.guide_number
            )));
        }
        self.transition_to(GuideStatus::Sent)
    }

    /// Applies the operator's decision and derives the resulting status.
    ///
    /// When `glosed` is omitted it is the part of the total that was not
    /// approved. Re-applying recomputes from scratch.
    pub fn approve(
        &mut self,
        approved: Option<Money>,
        glosed: Option<Money>,
        reason: Option<String>,
    ) -> Result<GuideStatus, TissError> {
        if !matches!(
            self.status,
            GuideStatus::Sent
                | GuideStatus::Approved
                | GuideStatus::PartiallyApproved
                | GuideStatus::Rejected
        ) {
            return Err(TissError::transition("guide", self.status, GuideStatus::Approved));
        }
        if approved.is_some_and(|a| a.is_negative()) || glosed.is_some_and(|g| g.is_negative()) {
            return Err(TissError::validation(format!(
                "Negative amounts are not allowed for guide {}",
                self.guide_number
            )));
        }

        let total = self.total_amount;
        let approved_value = approved.unwrap_or_default();
        if approved_value > total {
            return Err(TissError::validation(format!(
                "Approved amount {} exceeds guide {} total {}",
                approved_value, self.guide_number, total
            )));
        }
        let glosed_value = glosed.unwrap_or_else(|| total - approved_value);
        if approved_value + glosed_value > total {
            return Err(TissError::validation(format!(
                "Approved {} plus glosed {} exceeds guide {} total {}",
                approved_value, glosed_value, self.guide_number, total
            )));
        }

        let status = if approved_value.is_zero() {
            GuideStatus::Rejected
        } else if approved_value == total && glosed_value.is_zero() {
            GuideStatus::Approved
        } else {
            GuideStatus::PartiallyApproved
        };

        self.approved_amount = approved;
        self.glosed_amount = Some(glosed_value);
        self.gloss_reason = reason;
        self.status = status;
        self.updated_at = Utc::now();
        Ok(status)
    }

    /// Spreads the guide-level decision over lines the operator did not itemise.
    ///
    /// What the itemised lines already account for is taken off first. The
    /// rest is split in proportion to each line's total price and the
    /// rounding remainder lands on the last line.
    pub(crate) fn allocate_to_procedures(&mut self, itemised: &HashSet<ProcedureId>) -> Result<(), TissError> {
        let mut approved_left = self.approved_amount.unwrap_or_default();
        let mut glosed_left = self.glosed_amount.unwrap_or_default();
        for line in self.procedures.iter().filter(|p| itemised.contains(&p.id)) {
            approved_left = approved_left.saturating_sub(line.approved_amount.unwrap_or_default());
            glosed_left = glosed_left.saturating_sub(line.glosed_amount.unwrap_or_default());
        }

        let pending: Vec<usize> = (0..self.procedures.len())
            .filter(|&i| !itemised.contains(&self.procedures[i].id))
            .collect();
        let base: Money = pending.iter().map(|&i| self.procedures[i].total_price()).sum();
        let share = |left: Money, price: Money| {
            if base.is_zero() {
                Money::zero()
            } else {
                Money::new(left.amount() * price.amount() / base.amount())
            }
        };

        let (mut approved_given, mut glosed_given) = (Money::zero(), Money::zero());
        for (n, &i) in pending.iter().enumerate() {
            let price = self.procedures[i].total_price();
            let (approved, glosed) = if n + 1 == pending.len() {
                (approved_left.saturating_sub(approved_given), glosed_left.saturating_sub(glosed_given))
            } else {
                (share(approved_left, price), share(glosed_left, price))
            };
            let line = &mut self.procedures[i];
            line.apply_override(Some(approved), Some(glosed), self.gloss_reason.clone())?;
            approved_given += line.approved_amount.unwrap_or_default();
            glosed_given += line.glosed_amount.unwrap_or_default();
        }
        Ok(())
    }

    /// Operator rejected the whole batch this guide travelled in
    pub(crate) fn reject(&mut self, reason: Option<String>) -> Result<(), TissError> {
        self.transition_to(GuideStatus::Rejected)?;
        self.approved_amount = None;
        self.glosed_amount = Some(self.total_amount);
        self.gloss_reason = reason;
        for line in &mut self.procedures {
            let total = line.total_price();
            line.apply_override(None, Some(total), self.gloss_reason.clone())?;
        }
        Ok(())
    }

    /// `Approved | PartiallyApproved -> Paid`
    pub fn mark_as_paid(&mut self) -> Result<(), TissError> {
        self.transition_to(GuideStatus::Paid)
    }

    pub fn is_settleable(&self) -> bool {
        matches!(self.status, GuideStatus::Approved | GuideStatus::PartiallyApproved)
    }

    pub fn is_glosed(&self) -> bool {
        self.glosed_amount.is_some_and(|g| g.is_positive())
    }

    /// Glosed share of the billed value, in percent
    pub fn glosa_percentage(&self) -> Decimal {
        percentage_of(self.glosed_amount.unwrap_or_default(), self.total_amount)
    }

    fn ensure_open(&self, action: &str) -> Result<(), TissError> {
        if self.status != GuideStatus::Open {
            return Err(TissError::validation(format!(
                "Cannot {} on guide {} in status {:?}",
                action, self.guide_number, self.status
            )));
        }
        Ok(())
    }

    fn transition_to(&mut self, target: GuideStatus) -> Result<(), TissError> {
        if !self.can_transition_to(target) {
            return Err(TissError::transition("guide", self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn can_transition_to(&self, target: GuideStatus) -> bool {
        use GuideStatus::*;
        matches!(
            (self.status, target),
            (Open, Sent) |
            (Sent, Approved) |
            (Sent, PartiallyApproved) |
            (Sent, Rejected) |
            (Approved, Paid) |
            (PartiallyApproved, Paid)
        )
    }

    fn recalculate_total(&mut self) {
        self.total_amount = self.procedures.iter().map(|p| p.total_price()).sum();
        self.updated_at = Utc::now();
    }
}
