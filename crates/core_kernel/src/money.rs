//! Money types with precise decimal arithmetic
//!
//! Claim values are billed in Brazilian reais only. Amounts are stored as
//! `rust_decimal::Decimal` rounded to centavos so that reconciliation sums
//! never drift the way floating point would.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places for BRL amounts
const CURRENCY_DP: u32 = 2;

/// Decimal places kept on percentages
const PERCENTAGE_DP: u32 = 2;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in reais
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a new Money value rounded to centavos
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointNearestEven))
    }

    /// Creates Money from an integer amount in centavos
    pub fn from_minor(minor_units: i64) -> Self {
        Self::new(Decimal::new(minor_units, CURRENCY_DP))
    }

    /// Zero reais
    pub fn zero() -> Self {
        Self(dec!(0))
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by an integer quantity
    pub fn times(&self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Subtraction that never goes below zero
    pub fn saturating_sub(&self, other: Money) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self::new(self.0 - other.0)
        }
    }

    /// Caps this amount at `ceiling`
    pub fn capped_at(self, ceiling: Money) -> Self {
        if self.0 <= ceiling.0 { self } else { ceiling }
    }

    /// Renders the amount with exactly two decimals, as the wire format expects
    pub fn to_wire(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|_| MoneyError::InvalidAmount(s.to_string()))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

/// `part / whole × 100`, rounded to two places with banker's rounding.
///
/// Returns zero when `whole` is zero.
pub fn percentage_of(part: Money, whole: Money) -> Decimal {
    ratio_percentage(part.amount(), whole.amount())
}

/// Same rule as [`percentage_of`] for plain quantities such as counts
pub fn ratio_percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part * dec!(100) / whole)
        .round_dp_with_strategy(PERCENTAGE_DP, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_centavos() {
        let m = Money::new(dec!(100.505));
        assert_eq!(m.amount(), dec!(100.50));
        let m = Money::new(dec!(100.515));
        assert_eq!(m.amount(), dec!(100.52));
    }

    #[test]
    fn test_money_from_minor() {
        assert_eq!(Money::from_minor(10050).amount(), dec!(100.50));
    }

    #[test]
    fn test_money_times_quantity() {
        let unit = Money::new(dec!(37.25));
        assert_eq!(unit.times(4).unwrap().amount(), dec!(149.00));
        assert_eq!(unit.times(0).unwrap(), Money::zero());
    }

    #[test]
    fn test_saturating_sub_and_cap() {
        let a = Money::new(dec!(100));
        let b = Money::new(dec!(150));
        assert_eq!(a.saturating_sub(b), Money::zero());
        assert_eq!(b.saturating_sub(a).amount(), dec!(50));
        assert_eq!(b.capped_at(a), a);
    }

    #[test]
    fn test_wire_format_has_two_decimals() {
        assert_eq!(Money::new(dec!(1000)).to_wire(), "1000.00");
        assert_eq!(Money::new(dec!(12.5)).to_wire(), "12.50");
    }

    #[test]
    fn test_percentage_of_zero_whole() {
        assert_eq!(percentage_of(Money::new(dec!(10)), Money::zero()), Decimal::ZERO);
    }

    #[test]
    fn test_ratio_percentage_of_counts() {
        assert_eq!(ratio_percentage(dec!(2), dec!(3)), dec!(66.67));
        assert_eq!(ratio_percentage(dec!(5), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_of() {
        let pct = percentage_of(Money::new(dec!(600)), Money::new(dec!(3000)));
        assert_eq!(pct, dec!(20));
        let pct = percentage_of(Money::new(dec!(1)), Money::new(dec!(3)));
        assert_eq!(pct, dec!(33.33));
    }

    #[test]
    fn test_sum() {
        let total: Money = vec![Money::new(dec!(1.10)), Money::new(dec!(2.20))].into_iter().sum();
        assert_eq!(total.amount(), dec!(3.30));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn percentage_never_exceeds_hundred_when_part_le_whole(
            part in 0i64..1_000_000i64,
            extra in 0i64..1_000_000i64
        ) {
            let whole = Money::from_minor(part + extra);
            let pct = percentage_of(Money::from_minor(part), whole);
            prop_assert!(pct >= Decimal::ZERO);
            prop_assert!(pct <= dec!(100));
        }

        #[test]
        fn money_addition_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a);
            let mb = Money::from_minor(b);
            let mc = Money::from_minor(c);
            prop_assert_eq!((ma + mb) + mc, ma + (mb + mc));
        }
    }
}
