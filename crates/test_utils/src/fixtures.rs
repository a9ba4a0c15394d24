//! Pre-built Test Fixtures
//!
//! Fixed ids, dates, amounts and master data. Values are stable across runs
//! so assertions can compare against literals.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{AppointmentId, ClinicId, InsuranceId, Money, OperatorId, TenantId};
use domain_tiss::{ClinicInfo, OperatorInfo};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Price of a routine consultation
    pub fn consultation_fee() -> Money {
        Money::new(dec!(150.00))
    }

    /// Unit price of a blood count exam
    pub fn exam_price() -> Money {
        Money::new(dec!(35.50))
    }

    pub fn thousand() -> Money {
        Money::new(dec!(1000.00))
    }

    pub fn zero() -> Money {
        Money::zero()
    }
}

/// Fixture for dates and timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn service_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    pub fn submitted_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
    }

    /// Ten days after [`Self::submitted_at`]
    pub fn processed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 25, 17, 30, 0).unwrap()
    }

    /// Reference "today" for trend windows
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    pub fn march_2024() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }
}

/// Fixture for strings used on the wire
pub struct StringFixtures;

impl StringFixtures {
    pub fn provider_code() -> &'static str {
        "PRV-1029"
    }

    pub fn ans_registration() -> &'static str {
        "346659"
    }

    pub fn protocol_number() -> &'static str {
        "PROT-2024-0001"
    }

    /// TUSS code for an office consultation
    pub fn consultation_code() -> &'static str {
        "10101012"
    }

    /// TUSS code for a blood count
    pub fn blood_count_code() -> &'static str {
        "40304361"
    }

    pub fn card_number() -> &'static str {
        "0087654321000"
    }
}

/// Fixture for fixed identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001))
    }

    pub fn other_tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0002))
    }

    pub fn clinic_id() -> ClinicId {
        ClinicId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0010))
    }

    pub fn operator_id() -> OperatorId {
        OperatorId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0020))
    }

    pub fn second_operator_id() -> OperatorId {
        OperatorId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0021))
    }

    pub fn appointment_id() -> AppointmentId {
        AppointmentId::new_v7()
    }

    pub fn insurance_id() -> InsuranceId {
        InsuranceId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0030))
    }
}

/// Fixture for clinic and operator master data
pub struct MasterDataFixtures;

impl MasterDataFixtures {
    pub fn clinic() -> ClinicInfo {
        ClinicInfo {
            id: IdFixtures::clinic_id(),
            provider_code: StringFixtures::provider_code().to_string(),
            name: "Clinica Vida & Saude".to_string(),
        }
    }

    pub fn operator() -> OperatorInfo {
        OperatorInfo {
            id: IdFixtures::operator_id(),
            ans_registration_number: StringFixtures::ans_registration().to_string(),
            trade_name: "Unimed Central".to_string(),
        }
    }

    pub fn second_operator() -> OperatorInfo {
        OperatorInfo {
            id: IdFixtures::second_operator_id(),
            ans_registration_number: "005711".to_string(),
            trade_name: "Bradesco Saude".to_string(),
        }
    }
}

/// JSON bodies accepted by the HTTP API
pub struct JsonFixtures;

impl JsonFixtures {
    pub fn create_batch() -> serde_json::Value {
        serde_json::json!({
            "clinic_id": IdFixtures::clinic_id().as_uuid(),
            "operator_id": IdFixtures::operator_id().as_uuid(),
        })
    }

    /// A consultation guide with one procedure of R$ 150,00
    pub fn consultation_guide(guide_number: &str) -> serde_json::Value {
        serde_json::json!({
            "guide_number": guide_number,
            "guide_type": "CONSULTA",
            "appointment_id": IdFixtures::appointment_id().as_uuid(),
            "insurance_id": IdFixtures::insurance_id().as_uuid(),
            "service_date": TemporalFixtures::service_date(),
            "beneficiary": {
                "card_number": StringFixtures::card_number(),
                "name": "Joao da Silva"
            },
            "procedures": [{
                "code": StringFixtures::consultation_code(),
                "description": "Consulta em consultorio",
                "quantity": 1,
                "unit_price": "150.00"
            }]
        })
    }
}
