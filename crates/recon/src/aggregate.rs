use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::config::DateRange;
use crate::model::{Order, OrderView, Payment, Refund};

/// Per-order aggregate over SUCCESS payments.
#[derive(Debug, Default)]
struct PaymentAgg {
    amounts: Vec<f64>,
    first_success_time: Option<NaiveDateTime>,
    gateways_used: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct RefundAgg {
    amounts: Vec<f64>,
    first_refund_time: Option<NaiveDateTime>,
}

/// Keep orders whose order_datetime falls inside `range`. Payments and refunds
/// are not filtered; they drop out later through the join.
pub fn filter_orders(orders: &[Order], range: &DateRange) -> Vec<Order> {
    if range.is_unbounded() {
        return orders.to_vec();
    }
    let kept: Vec<Order> = orders
        .iter()
        .filter(|o| range.contains(o.order_datetime))
        .cloned()
        .collect();
    log::debug!(
        "date filter kept {} of {} orders",
        kept.len(),
        orders.len()
    );
    kept
}

/// Left-join orders with successful-payment and refund aggregates.
///
/// One row per distinct order_id, in input order. Missing sums default to 0,
/// missing timestamps stay unknown, missing gateway sets are empty.
pub fn aggregate(orders: &[Order], payments: &[Payment], refunds: &[Refund]) -> Vec<OrderView> {
    let mut payment_aggs: HashMap<&str, PaymentAgg> = HashMap::new();
    for p in payments.iter().filter(|p| p.payment_status.is_success()) {
        let agg = payment_aggs.entry(p.order_id.as_str()).or_default();
        if let Some(amount) = p.paid_amount {
            agg.amounts.push(amount);
        }
        agg.first_success_time = earliest(agg.first_success_time, p.payment_datetime);
        if let Some(ref gateway) = p.gateway {
            agg.gateways_used.insert(gateway.clone());
        }
    }

    let mut refund_aggs: HashMap<&str, RefundAgg> = HashMap::new();
    for r in refunds {
        let agg = refund_aggs.entry(r.order_id.as_str()).or_default();
        if let Some(amount) = r.refund_amount {
            agg.amounts.push(amount);
        }
        agg.first_refund_time = earliest(agg.first_refund_time, r.refund_datetime);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(orders.len());
    let mut views = Vec::with_capacity(orders.len());

    for order in orders {
        if !seen.insert(order.order_id.as_str()) {
            log::warn!("duplicate order_id '{}' ignored", order.order_id);
            continue;
        }

        let pay = payment_aggs.remove(order.order_id.as_str()).unwrap_or_default();
        let refund = refund_aggs.remove(order.order_id.as_str()).unwrap_or_default();

        views.push(OrderView {
            order: order.clone(),
            success_sum: stable_sum(pay.amounts),
            first_success_time: pay.first_success_time,
            gateways_used: pay.gateways_used,
            refund_sum: stable_sum(refund.amounts),
            first_refund_time: refund.first_refund_time,
        });
    }

    if !payment_aggs.is_empty() || !refund_aggs.is_empty() {
        log::debug!(
            "{} payment group(s) and {} refund group(s) had no matching order",
            payment_aggs.len(),
            refund_aggs.len()
        );
    }

    views
}

fn earliest(current: Option<NaiveDateTime>, candidate: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Sum in sorted order so the result does not depend on record order.
pub(crate) fn stable_sum(mut amounts: Vec<f64>) -> f64 {
    amounts.sort_by(f64::total_cmp);
    amounts.into_iter().fold(0.0, |acc, amount| acc + amount)
}
