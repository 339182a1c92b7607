use chrono::{DateTime, Utc};

use crate::aggregate::{aggregate, filter_orders};
use crate::config::RunConfig;
use crate::error::ReconError;
use crate::model::{RunInput, RunResult};
use crate::report::{build_report, ReportContext};
use crate::rollup::{daily_anomaly_summary, daily_summary, merged_daily_report};
use crate::rules::evaluate;
use crate::stats::BatchStats;

/// Run one batch: filter → aggregate → batch stats → rules → rollups → report.
///
/// Configuration is resolved before any row is touched, so an invalid config
/// fails without doing work.
pub fn run(config: &RunConfig, input: &RunInput, run_at: DateTime<Utc>) -> Result<RunResult, ReconError> {
    let filters = config.filters.resolve()?;

    let orders = filter_orders(&input.orders, &filters.date_range);
    let views = aggregate(&orders, &input.payments, &input.refunds);
    log::info!(
        "reconciled {} orders against {} payments and {} refunds",
        views.len(),
        input.payments.len(),
        input.refunds.len()
    );

    // Full-batch reduce before the per-row map.
    let stats = BatchStats::compute(&views);
    let annotated = evaluate(views, &stats, &filters.rules);

    let daily = merged_daily_report(daily_summary(&annotated), daily_anomaly_summary(&annotated));

    let report = build_report(
        &annotated,
        daily.clone(),
        ReportContext {
            run_at,
            loaded_orders: input.orders.len(),
            total_payments: input.payments.len(),
            total_refunds: input.refunds.len(),
            filters: filters.applied,
        },
    );

    Ok(RunResult {
        annotated,
        daily,
        report,
    })
}
