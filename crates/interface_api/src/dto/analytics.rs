//! Analytics query DTOs
//!
//! Report bodies are the domain report rows serialized as-is.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ClinicId, DateRange};

use crate::error::ApiError;

const DEFAULT_MONTHS: u32 = 6;

/// `?clinic_id=..&start=YYYY-MM-DD&end=YYYY-MM-DD`
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub clinic_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodQuery {
    pub fn clinic_id(&self) -> ClinicId {
        ClinicId::from(self.clinic_id)
    }

    pub fn period(&self) -> Result<DateRange, ApiError> {
        Ok(DateRange::new(self.start, self.end)?)
    }
}

/// `?clinic_id=..&months=6&today=YYYY-MM-DD`
#[derive(Debug, Deserialize, Validate)]
pub struct WindowQuery {
    pub clinic_id: Uuid,
    #[validate(range(min = 1, max = 36, message = "months must be between 1 and 36"))]
    pub months: Option<u32>,
    /// Reference day; defaults to the current UTC date
    pub today: Option<NaiveDate>,
}

impl WindowQuery {
    pub fn clinic_id(&self) -> ClinicId {
        ClinicId::from(self.clinic_id)
    }

    pub fn months(&self) -> u32 {
        self.months.unwrap_or(DEFAULT_MONTHS)
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_period_is_bad_request() {
        let query = PeriodQuery {
            clinic_id: Uuid::new_v4(),
            start: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        assert!(matches!(query.period(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_window_defaults_and_limits() {
        let query = WindowQuery {
            clinic_id: Uuid::new_v4(),
            months: None,
            today: None,
        };
        assert_eq!(query.months(), 6);
        assert!(query.validate().is_ok());

        let too_long = WindowQuery {
            months: Some(48),
            ..query
        };
        assert!(too_long.validate().is_err());
    }
}
