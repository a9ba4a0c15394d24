//! TISS Claim Batch Domain
//!
//! This crate implements insurance-claim batch submission and reconciliation
//! under the Brazilian TISS standard: clinics group guides into batches bound
//! for one operator, render them as regulator XML, ingest the operator's
//! response and analyse what was glosed.
//!
//! # Batch Lifecycle
//!
//! ```text
//! Draft -> ReadyToSend -> Sent -> Processing -> Processed/PartiallyPaid/Rejected -> Paid
//! ```
//!
//! Guides follow their own lifecycle inside the batch:
//!
//! ```text
//! Open -> Sent -> Approved/PartiallyApproved/Rejected -> Paid
//! ```

pub mod procedure;
pub mod guide;
pub mod batch;
pub mod codec;
pub mod reconciler;
pub mod analytics;
pub mod authorization;
pub mod ports;
pub mod service;
pub mod error;

pub use procedure::ClaimProcedure;
pub use guide::{Beneficiary, ClaimGuide, GuideStatus, GuideType};
pub use batch::{BatchStatus, ClaimBatch};
pub use codec::{CodecConfig, TissCodec, TissXmlDocument, XmlValidationResult};
pub use reconciler::{
    BatchResponse, GuideResponse, ProcedureResponse, ReconciliationOutcome, ResponseReconciler,
};
pub use analytics::{ClaimsAnalytics, GlosaAlertThresholds};
pub use authorization::{AuthorizationRequest, AuthorizationStatus};
pub use ports::{ClinicInfo, OperatorInfo};
pub use service::{TissPorts, TissService};
pub use error::TissError;
