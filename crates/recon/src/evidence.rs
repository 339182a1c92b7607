use chrono::NaiveDateTime;

use crate::model::{AnnotatedOrderView, AnomalyReason, DetailedAnomalyRecord, OrderView, Rule};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Rule {
    /// Human-readable label used in explanations.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::PaymentMismatch => "Payment mismatch",
            Self::OverRefund => "Over-refund",
            Self::LateRefund => "Late refund",
            Self::Offhours => "Off-hours order",
            Self::Weekend => "Weekend order",
            Self::Multigateway => "Multi-gateway success",
            Self::OutlierAmount => "Outlier amount",
            Self::InvalidAmount => "Invalid/negative amount",
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::PaymentMismatch => "Verify payment records and reconcile discrepancies",
            Self::OverRefund => "Check refund process for errors or fraud",
            Self::LateRefund => "Ensure refunds are processed within 7 days",
            Self::Offhours => "Verify legitimacy of off-hours transactions",
            Self::Weekend => "Check if weekend policy was followed",
            Self::Multigateway => "Verify if multiple payments were intended",
            Self::OutlierAmount => "Review unusual transaction amounts",
            Self::InvalidAmount => "Check data source for incorrect negative amounts",
        }
    }

    /// Evidence sentence built from the row's own values.
    pub fn evidence(&self, view: &OrderView) -> String {
        let order = &view.order;
        match self {
            Self::PaymentMismatch => format!(
                "Order amount: {}, Successful payments sum: {}",
                amount(order.order_amount),
                amount(Some(view.success_sum))
            ),
            Self::OverRefund => format!(
                "Refund sum: {} exceeds order amount: {}",
                amount(Some(view.refund_sum)),
                amount(order.order_amount)
            ),
            Self::LateRefund => format!(
                "First refund at {}, order placed at {}",
                timestamp(view.first_refund_time),
                timestamp(order.order_datetime)
            ),
            Self::Offhours => match order.order_datetime {
                Some(at) => format!("Order placed at {}", at.format("%H:%M:%S")),
                None => "Order placed at unknown".to_string(),
            },
            Self::Weekend => match order.order_datetime {
                Some(at) => format!("Order placed on {}", at.format("%A")),
                None => "Order placed on unknown".to_string(),
            },
            Self::Multigateway => format!(
                "Gateways used: {}",
                view.gateways_used
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::OutlierAmount => format!("Order amount: {}", amount(order.order_amount)),
            Self::InvalidAmount => format!(
                "Order amount: {}, Payment sum: {}, Refund sum: {}",
                amount(order.order_amount),
                amount(Some(view.success_sum)),
                amount(Some(view.refund_sum))
            ),
        }
    }
}

fn amount(value: Option<f64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| format!("{v:.2}"))
}

fn timestamp(value: Option<NaiveDateTime>) -> String {
    value.map_or_else(
        || "unknown".to_string(),
        |at| at.format(TIMESTAMP_FORMAT).to_string(),
    )
}

/// Explain one row. `None` when no rule fired.
pub fn explain(row: &AnnotatedOrderView) -> Option<DetailedAnomalyRecord> {
    if !row.is_anomalous() {
        return None;
    }
    let anomalies = row
        .flags
        .triggered()
        .map(|rule| AnomalyReason {
            rule,
            reason: rule.reason(),
            evidence: rule.evidence(&row.view),
            suggested_action: rule.suggested_action(),
        })
        .collect();

    Some(DetailedAnomalyRecord {
        order_id: row.view.order.order_id.clone(),
        customer_id: row.view.order.customer_id.clone(),
        anomalies,
    })
}

/// One record per anomalous row, in row order; reasons in canonical rule order.
pub fn detailed_anomalies(rows: &[AnnotatedOrderView]) -> Vec<DetailedAnomalyRecord> {
    rows.iter().filter_map(explain).collect()
}
