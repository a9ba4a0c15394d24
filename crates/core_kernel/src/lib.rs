//! Core Kernel - Foundational types for the TISS claims engine
//!
//! This crate provides the building blocks shared by the claim batch domain
//! and the API layer:
//! - Money with precise fixed-point arithmetic and glosa percentages
//! - Reporting periods (date ranges, calendar months) and clinic timezones
//! - Strongly-typed identifiers
//! - Port primitives for injected collaborators

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, MoneyError, percentage_of, ratio_percentage};
pub use temporal::{DateRange, YearMonth, Timezone, TemporalError};
pub use identifiers::{
    TenantId, ClinicId, OperatorId, BatchId, GuideId, ProcedureId,
    AppointmentId, InsuranceId, AuthorizationRequestId,
};
pub use ports::{PortError, DomainPort};
