//! Report rows produced by [`ClaimsAnalytics`](super::ClaimsAnalytics)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, OperatorId, YearMonth, percentage_of};
use crate::batch::ClaimBatch;

/// Billed, approved and glosed totals for a set of batches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlosaSummary {
    pub total_billed: Money,
    pub total_approved: Money,
    pub total_glosed: Money,
    pub glosa_percentage: Decimal,
    pub batch_count: usize,
    pub guide_count: usize,
    pub glosed_guide_count: usize,
}

impl GlosaSummary {
    pub(crate) fn add_batch(&mut self, batch: &ClaimBatch) {
        self.batch_count += 1;
        for guide in batch.guides() {
            self.guide_count += 1;
            self.total_billed += guide.total_amount();
            self.total_approved += guide.approved_amount.unwrap_or_default();
            self.total_glosed += guide.glosed_amount.unwrap_or_default();
            if guide.is_glosed() {
                self.glosed_guide_count += 1;
            }
        }
        self.glosa_percentage = percentage_of(self.total_glosed, self.total_billed);
    }

    pub(crate) fn of<'a>(batches: impl IntoIterator<Item = &'a ClaimBatch>) -> Self {
        let mut summary = Self::default();
        for batch in batches {
            summary.add_batch(batch);
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorGlosa {
    pub operator_id: OperatorId,
    pub operator_name: String,
    #[serde(flatten)]
    pub summary: GlosaSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyGlosa {
    pub month: YearMonth,
    #[serde(flatten)]
    pub summary: GlosaSummary,
}

/// Glosa totals for one TUSS procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureGlosa {
    pub code: String,
    pub description: String,
    pub occurrences: usize,
    pub total_billed: Money,
    pub total_glosed: Money,
    pub glosa_percentage: Decimal,
}

/// Days between submission and processing for one operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTime {
    pub operator_id: OperatorId,
    pub operator_name: String,
    pub batch_count: usize,
    pub average_days: Decimal,
    pub min_days: i64,
    pub max_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    pub month: YearMonth,
    pub batch_count: usize,
    pub total_billed: Money,
    pub total_approved: Money,
    pub total_glosed: Money,
    pub glosa_percentage: Decimal,
    /// `None` when no batch of the month has both dates
    pub average_approval_days: Option<Decimal>,
}

/// Prior-authorization approval rate for one operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRate {
    pub operator_id: OperatorId,
    pub operator_name: String,
    pub total_requests: usize,
    pub approved_requests: usize,
    pub approval_rate: Decimal,
}
