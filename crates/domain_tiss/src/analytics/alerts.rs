//! Glosa alert thresholds

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, OperatorId};
use crate::error::TissError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
}

/// Percent cutoffs: below `medium` no alert, from `high` up a high alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlosaAlertThresholds {
    pub medium: Decimal,
    pub high: Decimal,
}

impl Default for GlosaAlertThresholds {
    fn default() -> Self {
        Self {
            medium: dec!(10),
            high: dec!(25),
        }
    }
}

impl GlosaAlertThresholds {
    pub fn new(medium: Decimal, high: Decimal) -> Result<Self, TissError> {
        if medium.is_sign_negative() || medium > high {
            return Err(TissError::validation(format!(
                "Alert thresholds must satisfy 0 <= medium <= high (got {} and {})",
                medium, high
            )));
        }
        Ok(Self { medium, high })
    }

    pub fn classify(&self, glosa_percentage: Decimal) -> Option<AlertSeverity> {
        if glosa_percentage >= self.high {
            Some(AlertSeverity::High)
        } else if glosa_percentage >= self.medium {
            Some(AlertSeverity::Medium)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertScope {
    Overall,
    Operator {
        operator_id: OperatorId,
        operator_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlosaAlert {
    pub scope: AlertScope,
    pub severity: AlertSeverity,
    pub glosa_percentage: Decimal,
    pub total_glosed: Money,
    pub message: String,
}
