//! Anomaly rule engine.
//!
//! Every rule is a pure function of one [`OrderView`]. Only the outlier rule
//! also reads the batch statistic, which must be computed over the whole batch
//! first (see [`BatchStats::compute`]).

use chrono::{Datelike, Weekday};

use crate::config::RuleConfig;
use crate::model::{AnnotatedOrderView, AnomalyFlags, OrderView, Rule};
use crate::stats::BatchStats;

/// Days a refund may trail its order before it counts as late.
pub const LATE_REFUND_DAYS: i64 = 7;

pub type Predicate = fn(&OrderView, &BatchStats, &RuleConfig) -> bool;

impl Rule {
    pub fn predicate(self) -> Predicate {
        match self {
            Rule::PaymentMismatch => payment_mismatch,
            Rule::OverRefund => over_refund,
            Rule::LateRefund => late_refund,
            Rule::Offhours => offhours,
            Rule::Weekend => weekend,
            Rule::Multigateway => multigateway,
            Rule::OutlierAmount => outlier_amount,
            Rule::InvalidAmount => invalid_amount,
        }
    }

    pub fn check(self, view: &OrderView, stats: &BatchStats, config: &RuleConfig) -> bool {
        (self.predicate())(view, stats, config)
    }
}

/// Flag every row. Consumes the views and returns the annotated rows in the
/// same order.
pub fn evaluate(
    views: Vec<OrderView>,
    stats: &BatchStats,
    config: &RuleConfig,
) -> Vec<AnnotatedOrderView> {
    let annotated: Vec<AnnotatedOrderView> = views
        .into_iter()
        .map(|view| {
            let flags = AnomalyFlags::from_fn(|rule| rule.check(&view, stats, config));
            AnnotatedOrderView { view, flags }
        })
        .collect();

    log::info!(
        "flagged {} of {} orders",
        annotated.iter().filter(|row| row.is_anomalous()).count(),
        annotated.len()
    );
    annotated
}

/// Round half to even at two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

fn payment_mismatch(view: &OrderView, _: &BatchStats, _: &RuleConfig) -> bool {
    view.order
        .order_amount
        .is_some_and(|amount| round2(amount) != round2(view.success_sum))
}

fn over_refund(view: &OrderView, _: &BatchStats, _: &RuleConfig) -> bool {
    view.order
        .order_amount
        .is_some_and(|amount| view.refund_sum > amount)
}

fn late_refund(view: &OrderView, _: &BatchStats, _: &RuleConfig) -> bool {
    match (view.first_refund_time, view.order.order_datetime) {
        (Some(refunded), Some(ordered)) => (refunded - ordered).num_days() > LATE_REFUND_DAYS,
        _ => false,
    }
}

fn offhours(view: &OrderView, _: &BatchStats, config: &RuleConfig) -> bool {
    match (config.offhours, view.order.order_datetime) {
        (Some(window), Some(at)) => window.contains(at),
        _ => false,
    }
}

fn weekend(view: &OrderView, _: &BatchStats, config: &RuleConfig) -> bool {
    config.weekend
        && view
            .order
            .order_datetime
            .is_some_and(|at| matches!(at.weekday(), Weekday::Sat | Weekday::Sun))
}

fn multigateway(view: &OrderView, _: &BatchStats, _: &RuleConfig) -> bool {
    view.gateways_used.len() > 1
}

fn outlier_amount(view: &OrderView, stats: &BatchStats, _: &RuleConfig) -> bool {
    match (stats.amount_quartiles, view.order.order_amount) {
        (Some(quartiles), Some(amount)) => quartiles.is_outlier(amount),
        _ => false,
    }
}

fn invalid_amount(view: &OrderView, _: &BatchStats, _: &RuleConfig) -> bool {
    view.order.order_amount.is_some_and(|amount| amount <= 0.0)
        || view.success_sum < 0.0
        || view.refund_sum < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OffHoursWindow;
    use crate::model::Order;
    use chrono::NaiveDateTime;
    use std::collections::BTreeSet;

    fn at(s: &str) -> Option<NaiveDateTime> {
        Some(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
    }

    fn view(amount: f64, success_sum: f64) -> OrderView {
        OrderView {
            order: Order {
                order_id: "o1".into(),
                // 2024-01-01 is a Monday.
                order_datetime: at("2024-01-01 12:00"),
                order_amount: Some(amount),
                customer_id: None,
            },
            success_sum,
            first_success_time: None,
            gateways_used: BTreeSet::new(),
            refund_sum: 0.0,
            first_refund_time: None,
        }
    }

    fn check(rule: Rule, v: &OrderView) -> bool {
        rule.check(v, &BatchStats::default(), &RuleConfig::default())
    }

    fn window(s: &str) -> RuleConfig {
        RuleConfig {
            offhours: Some(s.parse::<OffHoursWindow>().unwrap()),
            weekend: false,
        }
    }

    #[test]
    fn payment_mismatch_rounds_to_cents() {
        assert!(!check(Rule::PaymentMismatch, &view(100.0, 99.999)));
        assert!(check(Rule::PaymentMismatch, &view(100.0, 100.01)));
        assert!(!check(Rule::PaymentMismatch, &view(100.0, 100.0)));
        assert!(check(Rule::PaymentMismatch, &view(100.0, 0.0)));
    }

    #[test]
    fn round_half_to_even() {
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(0.5), 0.5);
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn over_refund_strictly_greater() {
        let mut v = view(50.0, 50.0);
        v.refund_sum = 50.0;
        assert!(!check(Rule::OverRefund, &v));
        v.refund_sum = 50.01;
        assert!(check(Rule::OverRefund, &v));
    }

    #[test]
    fn late_refund_boundary_is_exclusive() {
        let mut v = view(10.0, 10.0);
        v.order.order_datetime = at("2024-01-01 00:00");
        v.first_refund_time = at("2024-01-09 00:00");
        assert!(check(Rule::LateRefund, &v));
        v.first_refund_time = at("2024-01-08 00:00");
        assert!(!check(Rule::LateRefund, &v));
        // 7 days 23 hours truncates to 7.
        v.first_refund_time = at("2024-01-08 23:00");
        assert!(!check(Rule::LateRefund, &v));
        // Refund before order.
        v.first_refund_time = at("2023-12-01 00:00");
        assert!(!check(Rule::LateRefund, &v));
        v.first_refund_time = None;
        assert!(!check(Rule::LateRefund, &v));
    }

    #[test]
    fn offhours_overnight_and_daytime() {
        let mut v = view(10.0, 10.0);
        let overnight = window("21:00-09:00");
        let daytime = window("09:00-21:00");
        let stats = BatchStats::default();

        v.order.order_datetime = at("2024-01-01 23:30");
        assert!(Rule::Offhours.check(&v, &stats, &overnight));
        v.order.order_datetime = at("2024-01-01 10:00");
        assert!(!Rule::Offhours.check(&v, &stats, &overnight));
        assert!(Rule::Offhours.check(&v, &stats, &daytime));
        v.order.order_datetime = at("2024-01-01 22:00");
        assert!(!Rule::Offhours.check(&v, &stats, &daytime));
    }

    #[test]
    fn offhours_disabled_or_unknown_time_is_false() {
        let mut v = view(10.0, 10.0);
        v.order.order_datetime = at("2024-01-01 23:30");
        assert!(!check(Rule::Offhours, &v));
        v.order.order_datetime = None;
        assert!(!Rule::Offhours.check(&v, &BatchStats::default(), &window("00:00-23:59")));
    }

    #[test]
    fn weekend_only_when_enabled() {
        let mut v = view(10.0, 10.0);
        v.order.order_datetime = at("2024-01-06 12:00"); // Saturday
        let enabled = RuleConfig { offhours: None, weekend: true };
        let stats = BatchStats::default();
        assert!(Rule::Weekend.check(&v, &stats, &enabled));
        assert!(!check(Rule::Weekend, &v));
        v.order.order_datetime = at("2024-01-07 12:00"); // Sunday
        assert!(Rule::Weekend.check(&v, &stats, &enabled));
        v.order.order_datetime = at("2024-01-08 12:00"); // Monday
        assert!(!Rule::Weekend.check(&v, &stats, &enabled));
        v.order.order_datetime = None;
        assert!(!Rule::Weekend.check(&v, &stats, &enabled));
    }

    #[test]
    fn multigateway_needs_two_distinct() {
        let mut v = view(10.0, 10.0);
        v.gateways_used.insert("stripe".into());
        assert!(!check(Rule::Multigateway, &v));
        v.gateways_used.insert("razorpay".into());
        assert!(check(Rule::Multigateway, &v));
    }

    #[test]
    fn invalid_amount_conditions() {
        assert!(check(Rule::InvalidAmount, &view(0.0, 0.0)));
        assert!(check(Rule::InvalidAmount, &view(-5.0, 0.0)));
        assert!(check(Rule::InvalidAmount, &view(10.0, -1.0)));
        let mut v = view(10.0, 10.0);
        assert!(!check(Rule::InvalidAmount, &v));
        v.refund_sum = -0.5;
        assert!(check(Rule::InvalidAmount, &v));
    }

    #[test]
    fn unknown_amount_never_triggers_amount_rules() {
        let mut v = view(10.0, 10.0);
        v.order.order_amount = None;
        v.refund_sum = 3.0;
        let stats = BatchStats::compute(&[view(1.0, 0.0), view(2.0, 0.0), view(3.0, 0.0)]);
        for rule in [Rule::PaymentMismatch, Rule::OverRefund, Rule::OutlierAmount, Rule::InvalidAmount] {
            assert!(!rule.check(&v, &stats, &RuleConfig::default()), "{rule}");
        }
    }

    #[test]
    fn outlier_is_batch_relative() {
        let base: Vec<OrderView> = [10.0, 11.0, 12.0, 13.0, 14.0, 40.0]
            .iter()
            .map(|a| view(*a, *a))
            .collect();
        let target = view(40.0, 40.0);

        let stats_a = BatchStats::compute(&base);
        assert!(Rule::OutlierAmount.check(&target, &stats_a, &RuleConfig::default()));

        let mut widened = base.clone();
        widened.push(view(10_000.0, 0.0));
        widened.push(view(9_000.0, 0.0));
        let stats_b = BatchStats::compute(&widened);
        assert!(!Rule::OutlierAmount.check(&target, &stats_b, &RuleConfig::default()));
    }

    #[test]
    fn evaluate_preserves_order_and_sets_all_columns() {
        let views = vec![view(100.0, 100.0), view(100.0, 50.0)];
        let stats = BatchStats::compute(&views);
        let rows = evaluate(views, &stats, &RuleConfig::default());
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].is_anomalous());
        assert!(rows[1].flags.payment_mismatch);
        assert_eq!(rows[1].flags.triggered().collect::<Vec<_>>(), vec![Rule::PaymentMismatch]);
    }
}
