//! Port primitives for injected collaborators
//!
//! The claims engine never talks to a database, a file system or another
//! module of the SaaS directly. Each collaborator is a trait defined by the
//! domain crate that extends [`DomainPort`], and every adapter reports
//! failures through the shared [`PortError`].
//!
//! ```text
//!   TissService ──► BatchRepository / ClinicLookup / OperatorLookup / FileStore
//!                          ▲                     ▲
//!                 in-memory adapter      filesystem adapter (interface_api)
//! ```
//!
//! Ports are synchronous: the engine performs no network I/O of its own and
//! callers decide where blocking work runs.

use std::fmt;
use thiserror::Error;

/// Error type for port operations
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred in the adapter
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// The operation conflicts with existing data (duplicate key, stale write)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Storage backend failure
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a Storage error wrapping the underlying cause
    pub fn storage(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        PortError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if a concurrent writer got there first
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker trait for all domain ports
///
/// Ports are shared across request handlers, so every implementation must
/// be thread-safe.
pub trait DomainPort: Send + Sync + 'static {}
