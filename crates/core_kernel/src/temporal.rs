//! Reporting periods and clinic timezones
//!
//! Analytics are scoped by an inclusive [`DateRange`] and grouped by
//! calendar [`YearMonth`]. The wire header is stamped in the clinic's
//! local time through [`Timezone`].

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must not be after end {end}")]
    InvalidPeriod {
        start: String,
        end: String,
    },

    #[error("Invalid month: {year}-{month}")]
    InvalidMonth {
        year: i32,
        month: u32,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Timezone wrapper for clinic locations
///
/// Wraps chrono_tz::Tz with string serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Brasília time, where the regulator's timestamps are read
    pub fn sao_paulo() -> Self {
        Self(chrono_tz::America::Sao_Paulo)
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::sao_paulo()
    }
}

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The last `months` calendar months, including the month of `today`.
    ///
    /// Starts on the first day of the earliest month and ends on `today`.
    /// A request for zero months is treated as one.
    pub fn last_months(today: NaiveDate, months: u32) -> Self {
        let first_of_month = YearMonth::of(today).first_day();
        let back = months.saturating_sub(1);
        let start = first_of_month
            .checked_sub_months(Months::new(back))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// True when the UTC calendar date of `timestamp` falls inside the range
    pub fn contains_timestamp(&self, timestamp: DateTime<Utc>) -> bool {
        self.contains(timestamp.date_naive())
    }
}

/// A calendar month, ordered by `(year, month)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&month) {
            return Err(TemporalError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn of_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self::of(timestamp.date_naive())
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert!(range.contains(date(2024, 1, 1)));
        assert!(range.contains(date(2024, 1, 31)));
        assert!(!range.contains(date(2024, 2, 1)));
    }

    #[test]
    fn test_contains_timestamp_uses_utc_date() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        assert!(range.contains_timestamp(late));
    }

    #[test]
    fn test_last_months_crosses_year() {
        let range = DateRange::last_months(date(2024, 2, 15), 3);
        assert_eq!(range.start, date(2023, 12, 1));
        assert_eq!(range.end, date(2024, 2, 15));
    }

    #[test]
    fn test_last_months_zero_is_current_month() {
        let range = DateRange::last_months(date(2024, 5, 20), 0);
        assert_eq!(range.start, date(2024, 5, 1));
    }

    #[test]
    fn test_year_month_ordering() {
        let a = YearMonth::new(2023, 12).unwrap();
        let b = YearMonth::new(2024, 1).unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "2024-01");
        assert!(YearMonth::new(2024, 13).is_err());
    }

    #[test]
    fn test_timezone_parse_and_convert() {
        let tz: Timezone = "America/Sao_Paulo".parse().unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap();
        assert_eq!(tz.to_local(utc).format("%H:%M").to_string(), "12:00");
        assert!("Mars/Olympus".parse::<Timezone>().is_err());
    }
}
