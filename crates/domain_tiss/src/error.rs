//! TISS domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError};

/// Errors that can occur in the claim batch domain
///
/// Structural XML problems are not errors: they are reported as
/// [`crate::codec::XmlValidationResult`] values.
#[derive(Debug, Error)]
pub enum TissError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid {entity} status transition from {from} to {to}")]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("XML codec failure: {0}")]
    Codec(String),

    #[error("Reconciliation failed: {message}")]
    Reconciliation {
        message: String,
        unmatched_guides: Vec<String>,
        unmatched_procedures: Vec<String>,
    },

    #[error("Batch {batch_id} was modified concurrently (expected status {expected})")]
    ConcurrencyConflict { batch_id: String, expected: String },

    #[error(transparent)]
    Port(#[from] PortError),
}

impl TissError {
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        TissError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TissError::Validation(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        TissError::Codec(message.into())
    }

    pub(crate) fn transition(
        entity: &'static str,
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
    ) -> Self {
        TissError::InvalidStatusTransition {
            entity,
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    /// True for errors the caller caused and can fix (bad input, wrong state)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TissError::Validation(_) | TissError::InvalidStatusTransition { .. }
        )
    }
}

impl From<MoneyError> for TissError {
    fn from(err: MoneyError) -> Self {
        TissError::Validation(err.to_string())
    }
}
