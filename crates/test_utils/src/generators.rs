//! Property-Based Test Generators
//!
//! Proptest strategies producing guides and batches that satisfy the domain
//! invariants, so properties can focus on behaviour.

use core_kernel::Money;
use domain_tiss::{BatchStatus, ClaimBatch, ClaimGuide, GuideType};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::builders::{TestBatchBuilder, TestGuideBuilder};

/// Unit prices between R$ 0,01 and R$ 10.000,00
pub fn unit_price_strategy() -> impl Strategy<Value = Money> {
    (1i64..=1_000_000i64).prop_map(Money::from_minor)
}

/// Amounts between zero and R$ 100.000,00
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (0i64..=10_000_000i64).prop_map(Money::from_minor)
}

pub fn quantity_strategy() -> impl Strategy<Value = u32> {
    1u32..=20u32
}

/// Eight-digit TUSS codes
pub fn tuss_code_strategy() -> impl Strategy<Value = String> {
    "[1-9][0-9]{7}"
}

pub fn guide_type_strategy() -> impl Strategy<Value = GuideType> {
    prop::sample::select(GuideType::ALL.to_vec())
}

/// Glosa share between 0% and 100% in whole percent steps
pub fn glosa_fraction_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=100u32).prop_map(|pct| Decimal::from(pct) / Decimal::from(100))
}

/// An open guide of any type with one to five procedure lines
pub fn guide_strategy(guide_number: String) -> impl Strategy<Value = ClaimGuide> {
    (
        guide_type_strategy(),
        prop::collection::vec((tuss_code_strategy(), quantity_strategy(), unit_price_strategy()), 1..=5),
    )
        .prop_map(move |(guide_type, lines)| {
            let mut builder = TestGuideBuilder::new(guide_number.clone())
                .with_type(guide_type)
                .without_procedures();
            for (code, quantity, price) in lines {
                builder = builder.with_procedure(code, "Procedimento", quantity, price);
            }
            builder.build()
        })
}

/// A draft batch with one to `max_guides` guides
pub fn draft_batch_strategy(max_guides: usize) -> impl Strategy<Value = ClaimBatch> {
    prop::collection::vec(
        (guide_type_strategy(), prop::collection::vec(unit_price_strategy(), 1..=3)),
        1..=max_guides.max(1),
    )
    .prop_map(|specs| {
        let mut builder = TestBatchBuilder::new();
        for (i, (guide_type, prices)) in specs.into_iter().enumerate() {
            let mut guide = TestGuideBuilder::new(format!("G-{:04}", i + 1))
                .with_type(guide_type)
                .without_procedures();
            for price in prices {
                guide = guide.with_procedure("10101012", "Consulta", 1, price);
            }
            builder = builder.with_guide(guide.build());
        }
        builder.build()
    })
}

/// A batch whose operator response glosed the same share of every guide
///
/// The resulting status is whatever the response implies: `Processed`,
/// `PartiallyPaid` or `Rejected`.
pub fn processed_batch_strategy(max_guides: usize) -> impl Strategy<Value = ClaimBatch> {
    (
        prop::collection::vec(unit_price_strategy(), 1..=max_guides.max(1)),
        glosa_fraction_strategy(),
    )
        .prop_map(|(totals, fraction)| {
            TestBatchBuilder::new()
                .with_guide_totals(&totals)
                .glosing(fraction)
                .in_status(BatchStatus::Processed)
                .build()
        })
}
