//! Glosa analytics
//!
//! Read-only aggregation over a clinic's batches. A batch belongs to a
//! period when the UTC date of its `processed_date` falls inside the
//! [`DateRange`]; batches never processed are ignored entirely.
//!
//! Percentages follow [`percentage_of`]: two places, banker's rounding and
//! zero when nothing was billed. Ties in every ranking are broken by name or
//! code so output is deterministic.

mod alerts;
mod reports;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use core_kernel::{
    DateRange, Money, OperatorId, TenantId, YearMonth, percentage_of, ratio_percentage,
};
use crate::authorization::AuthorizationRequest;
use crate::batch::ClaimBatch;
use crate::ports::OperatorLookup;

pub use alerts::{AlertScope, AlertSeverity, GlosaAlert, GlosaAlertThresholds};
pub use reports::{
    ApprovalTime, AuthorizationRate, GlosaSummary, MonthlyGlosa, MonthlyPerformance,
    OperatorGlosa, ProcedureGlosa,
};

/// Display name used when an operator cannot be resolved
pub const UNKNOWN_OPERATOR: &str = "Desconhecida";

const TOP_PROCEDURES: usize = 10;

pub struct ClaimsAnalytics {
    operators: Arc<dyn OperatorLookup>,
    thresholds: GlosaAlertThresholds,
}

impl ClaimsAnalytics {
    pub fn new(operators: Arc<dyn OperatorLookup>, thresholds: GlosaAlertThresholds) -> Self {
        Self { operators, thresholds }
    }

    pub fn thresholds(&self) -> GlosaAlertThresholds {
        self.thresholds
    }

    pub fn glosa_summary(&self, batches: &[ClaimBatch], period: DateRange) -> GlosaSummary {
        GlosaSummary::of(in_period(batches, period))
    }

    /// Per-operator breakdown, highest glosa percentage first
    pub fn glosas_by_operator(
        &self,
        tenant: TenantId,
        batches: &[ClaimBatch],
        period: DateRange,
    ) -> Vec<OperatorGlosa> {
        let mut groups: HashMap<OperatorId, GlosaSummary> = HashMap::new();
        for batch in in_period(batches, period) {
            groups.entry(batch.operator_id).or_default().add_batch(batch);
        }

        let mut names = NameCache::new(self.operators.as_ref(), tenant);
        let mut rows: Vec<OperatorGlosa> = groups
            .into_iter()
            .map(|(operator_id, summary)| OperatorGlosa {
                operator_id,
                operator_name: names.get(operator_id),
                summary,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.summary
                .glosa_percentage
                .cmp(&a.summary.glosa_percentage)
                .then_with(|| a.operator_name.cmp(&b.operator_name))
        });
        rows
    }

    /// Monthly totals over the last `months` months, oldest first
    pub fn glosa_trend(&self, batches: &[ClaimBatch], today: NaiveDate, months: u32) -> Vec<MonthlyGlosa> {
        let period = DateRange::last_months(today, months);
        by_month(batches, period)
            .into_iter()
            .map(|(month, batches)| MonthlyGlosa {
                month,
                summary: GlosaSummary::of(batches),
            })
            .collect()
    }

    /// The ten procedures with the largest glosed value
    pub fn procedure_glosas(&self, batches: &[ClaimBatch], period: DateRange) -> Vec<ProcedureGlosa> {
        let mut groups: HashMap<(String, String), (usize, Money, Money)> = HashMap::new();
        let procedures = in_period(batches, period)
            .flat_map(|b| b.guides())
            .flat_map(|g| g.procedures());
        for procedure in procedures {
            let entry = groups
                .entry((procedure.code.clone(), procedure.description.clone()))
                .or_default();
            entry.0 += 1;
            entry.1 += procedure.total_price();
            entry.2 += procedure.glosed_amount.unwrap_or_default();
        }

        let mut rows: Vec<ProcedureGlosa> = groups
            .into_iter()
            .map(|((code, description), (occurrences, billed, glosed))| ProcedureGlosa {
                code,
                description,
                occurrences,
                total_billed: billed,
                total_glosed: glosed,
                glosa_percentage: percentage_of(glosed, billed),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_glosed
                .cmp(&a.total_glosed)
                .then_with(|| a.code.cmp(&b.code))
                .then_with(|| a.description.cmp(&b.description))
        });
        rows.truncate(TOP_PROCEDURES);
        rows
    }

    /// Submission-to-processing days per operator, fastest first
    pub fn approval_time_by_operator(
        &self,
        tenant: TenantId,
        batches: &[ClaimBatch],
        period: DateRange,
    ) -> Vec<ApprovalTime> {
        let mut groups: HashMap<OperatorId, Vec<i64>> = HashMap::new();
        for batch in in_period(batches, period) {
            if let Some(days) = approval_days(batch) {
                groups.entry(batch.operator_id).or_default().push(days);
            }
        }

        let mut names = NameCache::new(self.operators.as_ref(), tenant);
        let mut rows: Vec<ApprovalTime> = groups
            .into_iter()
            .filter_map(|(operator_id, days)| {
                Some(ApprovalTime {
                    operator_id,
                    operator_name: names.get(operator_id),
                    batch_count: days.len(),
                    average_days: average(&days)?,
                    min_days: *days.iter().min()?,
                    max_days: *days.iter().max()?,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.average_days
                .cmp(&b.average_days)
                .then_with(|| a.operator_name.cmp(&b.operator_name))
        });
        rows
    }

    /// Billing and turnaround per month over the last `months` months
    pub fn monthly_performance(
        &self,
        batches: &[ClaimBatch],
        today: NaiveDate,
        months: u32,
    ) -> Vec<MonthlyPerformance> {
        let period = DateRange::last_months(today, months);
        by_month(batches, period)
            .into_iter()
            .map(|(month, batches)| {
                let days: Vec<i64> = batches.iter().filter_map(|b| approval_days(b)).collect();
                let summary = GlosaSummary::of(batches.iter().copied());
                MonthlyPerformance {
                    month,
                    batch_count: summary.batch_count,
                    total_billed: summary.total_billed,
                    total_approved: summary.total_approved,
                    total_glosed: summary.total_glosed,
                    glosa_percentage: summary.glosa_percentage,
                    average_approval_days: average(&days),
                }
            })
            .collect()
    }

    /// Overall alert plus one per operator above the medium threshold,
    /// most severe and largest first
    pub fn glosa_alerts(&self, tenant: TenantId, batches: &[ClaimBatch], period: DateRange) -> Vec<GlosaAlert> {
        let mut alerts = Vec::new();

        let overall = self.glosa_summary(batches, period);
        if let Some(severity) = self.thresholds.classify(overall.glosa_percentage) {
            alerts.push(GlosaAlert {
                scope: AlertScope::Overall,
                severity,
                glosa_percentage: overall.glosa_percentage,
                total_glosed: overall.total_glosed,
                message: format!(
                    "Glosa rate of {}% over the period ({} glosed of {} billed)",
                    overall.glosa_percentage, overall.total_glosed, overall.total_billed
                ),
            });
        }

        for row in self.glosas_by_operator(tenant, batches, period) {
            if let Some(severity) = self.thresholds.classify(row.summary.glosa_percentage) {
                alerts.push(GlosaAlert {
                    message: format!(
                        "Operator {} glosed {}% of billed value",
                        row.operator_name, row.summary.glosa_percentage
                    ),
                    scope: AlertScope::Operator {
                        operator_id: row.operator_id,
                        operator_name: row.operator_name,
                    },
                    severity,
                    glosa_percentage: row.summary.glosa_percentage,
                    total_glosed: row.summary.total_glosed,
                });
            }
        }

        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.glosa_percentage.cmp(&a.glosa_percentage))
        });
        alerts
    }

    /// Approval rate of prior-authorization requests per operator, highest first.
    ///
    /// Requests whose insurance was never resolved are excluded.
    pub fn authorization_rate(
        &self,
        tenant: TenantId,
        requests: &[AuthorizationRequest],
        period: DateRange,
    ) -> Vec<AuthorizationRate> {
        let mut groups: HashMap<OperatorId, (usize, usize)> = HashMap::new();
        for request in requests.iter().filter(|r| period.contains_timestamp(r.requested_at)) {
            if let Some(operator_id) = request.resolved_operator() {
                let entry = groups.entry(operator_id).or_default();
                entry.0 += 1;
                if request.is_approved() {
                    entry.1 += 1;
                }
            }
        }

        let mut names = NameCache::new(self.operators.as_ref(), tenant);
        let mut rows: Vec<AuthorizationRate> = groups
            .into_iter()
            .map(|(operator_id, (total, approved))| AuthorizationRate {
                operator_id,
                operator_name: names.get(operator_id),
                total_requests: total,
                approved_requests: approved,
                approval_rate: ratio_percentage(Decimal::from(approved), Decimal::from(total)),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.approval_rate
                .cmp(&a.approval_rate)
                .then_with(|| a.operator_name.cmp(&b.operator_name))
        });
        rows
    }
}

fn in_period(batches: &[ClaimBatch], period: DateRange) -> impl Iterator<Item = &ClaimBatch> {
    batches
        .iter()
        .filter(move |b| b.processed_date.is_some_and(|d| period.contains_timestamp(d)))
}

fn by_month(batches: &[ClaimBatch], period: DateRange) -> BTreeMap<YearMonth, Vec<&ClaimBatch>> {
    let mut months: BTreeMap<YearMonth, Vec<&ClaimBatch>> = BTreeMap::new();
    for batch in in_period(batches, period) {
        if let Some(processed) = batch.processed_date {
            months.entry(YearMonth::of_timestamp(processed)).or_default().push(batch);
        }
    }
    months
}

fn approval_days(batch: &ClaimBatch) -> Option<i64> {
    match (batch.submitted_date, batch.processed_date) {
        (Some(submitted), Some(processed)) => Some((processed - submitted).num_days()),
        _ => None,
    }
}

fn average(days: &[i64]) -> Option<Decimal> {
    if days.is_empty() {
        return None;
    }
    let total: i64 = days.iter().sum();
    Some(
        (Decimal::from(total) / Decimal::from(days.len() as u64))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
    )
}

/// Resolves operator names once per report
struct NameCache<'a> {
    lookup: &'a dyn OperatorLookup,
    tenant: TenantId,
    names: HashMap<OperatorId, String>,
}

impl<'a> NameCache<'a> {
    fn new(lookup: &'a dyn OperatorLookup, tenant: TenantId) -> Self {
        Self {
            lookup,
            tenant,
            names: HashMap::new(),
        }
    }

    fn get(&mut self, operator_id: OperatorId) -> String {
        let (lookup, tenant) = (self.lookup, self.tenant);
        self.names
            .entry(operator_id)
            .or_insert_with(|| match lookup.get_operator(tenant, operator_id) {
                Ok(info) => info.trade_name,
                Err(e) => {
                    warn!(operator_id = %operator_id, error = %e, "Operator lookup failed, using fallback name");
                    UNKNOWN_OPERATOR.to_string()
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use core_kernel::{AppointmentId, ClinicId, InsuranceId};
    use rust_decimal_macros::dec;
    use crate::guide::{Beneficiary, ClaimGuide, GuideType};
    use crate::ports::memory::InMemoryOperatorLookup;
    use crate::ports::OperatorInfo;
    use crate::reconciler::{BatchResponse, GuideResponse, ResponseReconciler};

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn processed_batch(
        operator: OperatorId,
        guides: &[(rust_decimal::Decimal, rust_decimal::Decimal)],
        processed: DateTime<Utc>,
    ) -> ClaimBatch {
        let lines: Vec<_> = guides.iter().map(|(total, approved)| ("10101012", *total, *approved)).collect();
        batch_with_lines(operator, &lines, 10, processed)
    }

    /// One single-procedure guide per `(code, total, approved)` line
    fn batch_with_lines(
        operator: OperatorId,
        lines: &[(&str, rust_decimal::Decimal, rust_decimal::Decimal)],
        turnaround_days: i64,
        processed: DateTime<Utc>,
    ) -> ClaimBatch {
        let mut batch = ClaimBatch::new(ClinicId::new(), operator, "LOTE-000001").unwrap();
        for (i, (code, total, _)) in lines.iter().enumerate() {
            let mut guide = ClaimGuide::new(
                format!("G{}", i),
                GuideType::Consultation,
                AppointmentId::new(),
                InsuranceId::new(),
                Beneficiary { card_number: "1".into(), name: "P".into() },
                processed.date_naive(),
            )
            .unwrap();
            guide.add_procedure(*code, format!("Procedimento {}", code), 1, Money::new(*total)).unwrap();
            batch.add_guide(guide).unwrap();
        }
        batch.mark_as_ready_to_send().unwrap();
        batch.record_xml("a.xml", "memory://a.xml").unwrap();
        batch.submit("P").unwrap();
        let response = BatchResponse {
            protocol_number: "P".into(),
            response_document: None,
            guides: lines
                .iter()
                .enumerate()
                .map(|(i, (_, _, approved))| GuideResponse {
                    guide_number: format!("G{}", i),
                    approved_amount: Some(Money::new(*approved)),
                    glosed_amount: None,
                    gloss_reason: None,
                    procedures: Vec::new(),
                })
                .collect(),
        };
        ResponseReconciler::new()
            .process_batch_response(&mut batch, &response, processed)
            .unwrap();
        batch.submitted_date = Some(processed - chrono::Duration::days(turnaround_days));
        batch
    }

    fn operator(id: OperatorId, name: &str) -> OperatorInfo {
        OperatorInfo { id, ans_registration_number: "1".into(), trade_name: name.into() }
    }

    fn analytics(operators: Vec<OperatorInfo>) -> ClaimsAnalytics {
        ClaimsAnalytics::new(
            Arc::new(InMemoryOperatorLookup::with_operators(operators)),
            GlosaAlertThresholds::default(),
        )
    }

    fn year_2024() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_summary_of_three_guides() {
        let batch = processed_batch(
            OperatorId::new(),
            &[(dec!(1000), dec!(800)), (dec!(1000), dec!(800)), (dec!(1000), dec!(800))],
            ts(2024, 3, 15),
        );
        let summary = analytics(vec![]).glosa_summary(&[batch], year_2024());
        assert_eq!(summary.total_billed, Money::new(dec!(3000)));
        assert_eq!(summary.total_approved, Money::new(dec!(2400)));
        assert_eq!(summary.total_glosed, Money::new(dec!(600)));
        assert_eq!(summary.glosa_percentage, dec!(20));
        assert_eq!(summary.glosed_guide_count, 3);
    }

    #[test]
    fn test_out_of_range_batches_excluded() {
        let batch = processed_batch(OperatorId::new(), &[(dec!(100), dec!(50))], ts(2023, 12, 31));
        let summary = analytics(vec![]).glosa_summary(&[batch], year_2024());
        assert_eq!(summary.batch_count, 0);
        assert_eq!(summary.glosa_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_by_operator_sorted_desc_with_fallback_name() {
        let (a, b) = (OperatorId::new(), OperatorId::new());
        let batches = vec![
            processed_batch(a, &[(dec!(100), dec!(80))], ts(2024, 2, 1)),
            processed_batch(b, &[(dec!(100), dec!(70))], ts(2024, 2, 1)),
        ];
        let engine = analytics(vec![OperatorInfo {
            id: a,
            ans_registration_number: "1".into(),
            trade_name: "Operadora A".into(),
        }]);
        let rows = engine.glosas_by_operator(TenantId::new(), &batches, year_2024());
        assert_eq!(rows[0].operator_id, b);
        assert_eq!(rows[0].operator_name, UNKNOWN_OPERATOR);
        assert_eq!(rows[1].operator_name, "Operadora A");
    }

    #[test]
    fn test_trend_ascending() {
        let op = OperatorId::new();
        let batches = vec![
            processed_batch(op, &[(dec!(100), dec!(100))], ts(2024, 5, 3)),
            processed_batch(op, &[(dec!(100), dec!(50))], ts(2024, 3, 3)),
            processed_batch(op, &[(dec!(100), dec!(50))], ts(2023, 1, 3)),
        ];
        let trend = analytics(vec![]).glosa_trend(&batches, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(), 6);
        let months: Vec<String> = trend.iter().map(|t| t.month.to_string()).collect();
        assert_eq!(months, vec!["2024-03", "2024-05"]);
    }

    #[test]
    fn test_approval_time_and_alerts() {
        let op = OperatorId::new();
        let batches = vec![processed_batch(op, &[(dec!(100), dec!(60))], ts(2024, 6, 1))];
        let engine = analytics(vec![]);
        let times = engine.approval_time_by_operator(TenantId::new(), &batches, year_2024());
        assert_eq!(times[0].average_days, dec!(10));

        let alerts = engine.glosa_alerts(TenantId::new(), &batches, year_2024());
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity == AlertSeverity::High));
    }

    #[test]
    fn test_procedure_glosas_top_ten_descending() {
        let codes: Vec<String> = (1..=12).map(|k| format!("4030{:02}", k)).collect();
        let lines: Vec<_> = codes
            .iter()
            .enumerate()
            .map(|(i, code)| (code.as_str(), dec!(100), dec!(100) - Decimal::from(5 * (i as i64 + 1))))
            .collect();
        let batch = batch_with_lines(OperatorId::new(), &lines, 10, ts(2024, 4, 2));

        let rows = analytics(vec![]).procedure_glosas(&[batch], year_2024());
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].code, "403012");
        assert_eq!(rows[0].total_glosed, Money::new(dec!(60)));
        assert_eq!(rows[0].glosa_percentage, dec!(60));
        assert_eq!(rows[9].code, "403003");
        assert!(rows.windows(2).all(|w| w[0].total_glosed >= w[1].total_glosed));
    }

    #[test]
    fn test_procedure_glosas_grouped_and_tied_by_code() {
        let batches = vec![
            batch_with_lines(OperatorId::new(), &[("20", dec!(100), dec!(70)), ("10", dec!(50), dec!(35))], 10, ts(2024, 4, 2)),
            batch_with_lines(OperatorId::new(), &[("10", dec!(50), dec!(35))], 10, ts(2024, 4, 9)),
        ];
        let rows = analytics(vec![]).procedure_glosas(&batches, year_2024());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "10");
        assert_eq!(rows[0].occurrences, 2);
        assert_eq!(rows[0].total_glosed, Money::new(dec!(30)));
        assert_eq!(rows[1].code, "20");
        assert_eq!(rows[1].total_glosed, Money::new(dec!(30)));
    }

    #[test]
    fn test_approval_time_ascending_with_range() {
        let (slow, fast) = (OperatorId::new(), OperatorId::new());
        let batches = vec![
            batch_with_lines(slow, &[("1", dec!(100), dec!(100))], 4, ts(2024, 2, 10)),
            batch_with_lines(slow, &[("1", dec!(100), dec!(100))], 10, ts(2024, 3, 10)),
            batch_with_lines(slow, &[("1", dec!(100), dec!(100))], 5, ts(2024, 4, 10)),
            batch_with_lines(fast, &[("1", dec!(100), dec!(100))], 3, ts(2024, 3, 10)),
        ];
        let engine = analytics(vec![operator(slow, "Lenta"), operator(fast, "Rapida")]);
        let rows = engine.approval_time_by_operator(TenantId::new(), &batches, year_2024());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].operator_name, "Rapida");
        assert_eq!(rows[0].average_days, dec!(3));
        assert_eq!(rows[1].operator_name, "Lenta");
        assert_eq!(rows[1].batch_count, 3);
        assert_eq!(rows[1].average_days, dec!(6.33));
        assert_eq!(rows[1].min_days, 4);
        assert_eq!(rows[1].max_days, 10);
    }

    #[test]
    fn test_monthly_performance_average_days() {
        let op = OperatorId::new();
        let batches = vec![
            batch_with_lines(op, &[("1", dec!(200), dec!(150))], 4, ts(2024, 5, 6)),
            batch_with_lines(op, &[("1", dec!(200), dec!(200))], 7, ts(2024, 5, 20)),
            batch_with_lines(op, &[("1", dec!(100), dec!(100))], 12, ts(2024, 4, 2)),
        ];
        let rows = analytics(vec![]).monthly_performance(&batches, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), 3);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month.to_string(), "2024-04");
        assert_eq!(rows[0].average_approval_days, Some(dec!(12)));
        assert_eq!(rows[1].batch_count, 2);
        assert_eq!(rows[1].total_billed, Money::new(dec!(400)));
        assert_eq!(rows[1].glosa_percentage, dec!(12.5));
        assert_eq!(rows[1].average_approval_days, Some(dec!(5.5)));
    }

    #[test]
    fn test_alerts_ordered_by_severity_then_percentage() {
        let (high, medium, quiet) = (OperatorId::new(), OperatorId::new(), OperatorId::new());
        let batches = vec![
            batch_with_lines(high, &[("1", dec!(100), dec!(70))], 5, ts(2024, 6, 1)),
            batch_with_lines(medium, &[("1", dec!(100), dec!(88))], 5, ts(2024, 6, 1)),
            batch_with_lines(quiet, &[("1", dec!(100), dec!(95))], 5, ts(2024, 6, 1)),
        ];
        let engine = analytics(vec![
            operator(high, "Alta"),
            operator(medium, "Media"),
            operator(quiet, "Baixa"),
        ]);
        let alerts = engine.glosa_alerts(TenantId::new(), &batches, year_2024());

        let order: Vec<(AlertSeverity, Decimal)> =
            alerts.iter().map(|a| (a.severity, a.glosa_percentage)).collect();
        assert_eq!(
            order,
            vec![
                (AlertSeverity::High, dec!(30)),
                (AlertSeverity::Medium, dec!(15.67)),
                (AlertSeverity::Medium, dec!(12)),
            ]
        );
        assert!(matches!(alerts[0].scope, AlertScope::Operator { ref operator_name, .. } if operator_name == "Alta"));
        assert_eq!(alerts[1].scope, AlertScope::Overall);
    }

    #[test]
    fn test_by_operator_ties_broken_by_name() {
        let (b, a) = (OperatorId::new(), OperatorId::new());
        let batches = vec![
            batch_with_lines(b, &[("1", dec!(100), dec!(80))], 5, ts(2024, 6, 1)),
            batch_with_lines(a, &[("1", dec!(200), dec!(160))], 5, ts(2024, 6, 1)),
        ];
        let engine = analytics(vec![operator(b, "Beta Saude"), operator(a, "Alfa Saude")]);
        let rows = engine.glosas_by_operator(TenantId::new(), &batches, year_2024());
        let names: Vec<&str> = rows.iter().map(|r| r.operator_name.as_str()).collect();
        assert_eq!(names, vec!["Alfa Saude", "Beta Saude"]);
    }
}
