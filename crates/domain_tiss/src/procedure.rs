//! Claim procedures - the line items of a guide

use serde::{Deserialize, Serialize};

use core_kernel::{GuideId, Money, ProcedureId};
use crate::error::TissError;

/// One billed procedure (TUSS code) inside a guide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProcedure {
    pub id: ProcedureId,
    pub guide_id: GuideId,
    /// TUSS procedure code
    pub code: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Always `quantity × unit_price`
    total_price: Money,
    pub approved_amount: Option<Money>,
    pub glosed_amount: Option<Money>,
    pub gloss_reason: Option<String>,
}

impl ClaimProcedure {
    /// Creates a procedure line; the total is computed here and never set directly
    pub fn new(
        guide_id: GuideId,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, TissError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(TissError::validation("Procedure code is required"));
        }
        if unit_price.is_negative() {
            return Err(TissError::validation(format!(
                "Unit price for procedure {} cannot be negative",
                code
            )));
        }
        let total_price = unit_price.times(quantity)?;

        Ok(Self {
            id: ProcedureId::new_v7(),
            guide_id,
            code,
            description: description.into(),
            quantity,
            unit_price,
            total_price,
            approved_amount: None,
            glosed_amount: None,
            gloss_reason: None,
        })
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    /// Applies an insurer override for this line.
    ///
    /// The approved amount is capped at the total price and the glosed amount
    /// at whatever the approval leaves, so `approved + glosed <= total` holds.
    pub fn apply_override(
        &mut self,
        approved: Option<Money>,
        glosed: Option<Money>,
        reason: Option<String>,
    ) -> Result<(), TissError> {
        if approved.is_some_and(|a| a.is_negative()) || glosed.is_some_and(|g| g.is_negative()) {
            return Err(TissError::validation(format!(
                "Negative amounts are not allowed for procedure {}",
                self.id
            )));
        }

        let approved = approved.map(|a| a.capped_at(self.total_price));
        let remaining = self.total_price.saturating_sub(approved.unwrap_or_default());
        let glosed = glosed.map(|g| g.capped_at(remaining));

        self.approved_amount = approved;
        self.glosed_amount = glosed;
        self.gloss_reason = reason;
        Ok(())
    }

    pub fn is_glosed(&self) -> bool {
        self.glosed_amount.is_some_and(|g| g.is_positive())
    }
}
