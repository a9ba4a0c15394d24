//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful failure
//! messages than plain `assert_eq!`.

use core_kernel::Money;
use domain_tiss::{ClaimBatch, XmlValidationResult};
use rust_decimal::Decimal;

/// Asserts that two Money values are equal to the centavo
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Money mismatch: actual=R$ {}, expected=R$ {}",
        actual,
        expected
    );
}

/// Asserts that a percentage matches to two decimal places
pub fn assert_percentage_eq(actual: Decimal, expected: Decimal) {
    assert_eq!(
        actual.round_dp(2),
        expected.round_dp(2),
        "Percentage mismatch: actual={}%, expected={}%",
        actual,
        expected
    );
}

/// Asserts that a structural check passed, listing every error otherwise
pub fn assert_xml_valid(result: &XmlValidationResult) {
    assert!(
        result.is_valid && result.errors.is_empty(),
        "Expected valid TISS XML, got errors: {:?}",
        result.errors
    );
}

/// Asserts that a structural check failed with an error mentioning `needle`
pub fn assert_xml_error(result: &XmlValidationResult, needle: &str) {
    assert!(!result.is_valid, "Expected invalid TISS XML");
    assert!(
        result.errors.iter().any(|e| e.contains(needle)),
        "No error mentions {:?}: {:?}",
        needle,
        result.errors
    );
}

/// Asserts the batch's derived totals agree with its guides and procedures
///
/// Checks that every guide total is the sum of its procedure totals, the
/// batch total is the sum of guide totals, and approved plus glosed never
/// exceeds what was billed.
pub fn assert_batch_totals_consistent(batch: &ClaimBatch) {
    let mut billed = Money::zero();
    let mut approved = Money::zero();
    let mut glosed = Money::zero();

    for guide in batch.guides() {
        let procedures: Money = guide.procedures().iter().map(|p| p.total_price()).sum();
        assert_money_eq(guide.total_amount(), procedures);

        let guide_approved = guide.approved_amount.unwrap_or_default();
        let guide_glosed = guide.glosed_amount.unwrap_or_default();
        assert!(
            guide_approved + guide_glosed <= guide.total_amount(),
            "Guide {} settles more than billed: approved={}, glosed={}, total={}",
            guide.guide_number,
            guide_approved,
            guide_glosed,
            guide.total_amount()
        );

        billed += guide.total_amount();
        approved += guide_approved;
        glosed += guide_glosed;
    }

    assert_money_eq(batch.total_amount(), billed);
    assert_money_eq(batch.approved_amount(), approved);
    assert_money_eq(batch.glosed_amount(), glosed);
}
