use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aggregate::stable_sum;
use crate::model::{
    AnnotatedOrderView, AnomalyCounts, DailyAnomalySummary, DailyReportRow, DailySummary,
};

/// Bucket rows by the calendar date of order_datetime. Rows with an unknown
/// order_datetime belong to no bucket.
fn buckets(rows: &[AnnotatedOrderView]) -> BTreeMap<NaiveDate, Vec<&AnnotatedOrderView>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&AnnotatedOrderView>> = BTreeMap::new();
    for row in rows {
        if let Some(at) = row.view.order.order_datetime {
            by_date.entry(at.date()).or_default().push(row);
        }
    }
    by_date
}

/// Orders placed, successful payments, refunds and net revenue per date,
/// ascending by date.
pub fn daily_summary(rows: &[AnnotatedOrderView]) -> Vec<DailySummary> {
    buckets(rows)
        .into_iter()
        .map(|(date, day)| {
            let payments_success_sum = stable_sum(day.iter().map(|r| r.view.success_sum).collect());
            let refunds_sum = stable_sum(day.iter().map(|r| r.view.refund_sum).collect());
            DailySummary {
                date,
                orders_placed: day.len(),
                payments_success_sum,
                refunds_sum,
                net_revenue: payments_success_sum - refunds_sum,
            }
        })
        .collect()
}

/// Per-date count of each anomaly flag, ascending by date.
pub fn daily_anomaly_summary(rows: &[AnnotatedOrderView]) -> Vec<DailyAnomalySummary> {
    buckets(rows)
        .into_iter()
        .map(|(date, day)| DailyAnomalySummary {
            date,
            counts: day
                .iter()
                .fold(AnomalyCounts::default(), |counts, r| counts.plus(&r.flags)),
        })
        .collect()
}

/// Join daily summaries with anomaly counts on date. Every summary date is
/// kept; a date with no anomaly row gets zero counts.
pub fn merged_daily_report(
    summary: Vec<DailySummary>,
    anomalies: Vec<DailyAnomalySummary>,
) -> Vec<DailyReportRow> {
    let counts: BTreeMap<NaiveDate, AnomalyCounts> =
        anomalies.into_iter().map(|a| (a.date, a.counts)).collect();

    summary
        .into_iter()
        .map(|s| {
            let anomalies = counts.get(&s.date).copied().unwrap_or_default();
            DailyReportRow {
                summary: s,
                anomalies,
            }
        })
        .collect()
}

/// Total per-flag counts over the whole batch.
pub fn anomaly_counts(rows: &[AnnotatedOrderView]) -> AnomalyCounts {
    rows.iter()
        .fold(AnomalyCounts::default(), |counts, r| counts.plus(&r.flags))
}
