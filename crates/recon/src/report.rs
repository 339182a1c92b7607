use chrono::{DateTime, Utc};

use crate::evidence::detailed_anomalies;
use crate::model::{AnnotatedOrderView, AppliedFilters, DailyReportRow, Report, ReportMeta};
use crate::rollup::anomaly_counts;

/// Run-level facts the report echoes for audit, supplied by the orchestrator.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub run_at: DateTime<Utc>,
    /// Orders as loaded, before the date filter.
    pub loaded_orders: usize,
    pub total_payments: usize,
    pub total_refunds: usize,
    pub filters: AppliedFilters,
}

pub fn build_report(
    rows: &[AnnotatedOrderView],
    daily: Vec<DailyReportRow>,
    ctx: ReportContext,
) -> Report {
    let counts = anomaly_counts(rows);
    Report {
        metadata: ReportMeta {
            run_timestamp: ctx.run_at.to_rfc3339(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            total_orders: ctx.loaded_orders,
            total_payments: ctx.total_payments,
            total_refunds: ctx.total_refunds,
            filtered_orders: rows.len(),
            anomaly_summary: counts,
            filters: ctx.filters,
        },
        overall_metrics: daily,
        anomaly_counts: counts,
        detailed_anomalies: detailed_anomalies(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_report_has_zero_totals() {
        let ctx = ReportContext {
            run_at: Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap(),
            loaded_orders: 0,
            total_payments: 0,
            total_refunds: 0,
            filters: AppliedFilters::default(),
        };
        let report = build_report(&[], Vec::new(), ctx);
        assert_eq!(report.metadata.run_timestamp, "2024-02-01T06:00:00+00:00");
        assert_eq!(report.metadata.filtered_orders, 0);
        assert_eq!(report.anomaly_counts.total(), 0);
        assert!(report.overall_metrics.is_empty());
        assert!(report.detailed_anomalies.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metadata"]["filters"]["weekend"], false);
        assert_eq!(json["metadata"]["filters"]["offhours"], serde_json::Value::Null);
        assert_eq!(json["anomaly_counts"]["anomaly_late_refund"], 0);
    }
}
