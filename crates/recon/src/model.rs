use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub order_datetime: Option<NaiveDateTime>,
    pub order_amount: Option<f64>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    Success,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "SUCCESS" => Self::Success,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub payment_id: String,
    pub order_id: String,
    pub payment_datetime: Option<NaiveDateTime>,
    pub paid_amount: Option<f64>,
    pub payment_status: PaymentStatus,
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refund {
    pub refund_id: String,
    pub order_id: String,
    pub refund_datetime: Option<NaiveDateTime>,
    pub refund_amount: Option<f64>,
}

/// One batch snapshot, already loaded and cleaned.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub refunds: Vec<Refund>,
}

// ---------------------------------------------------------------------------
// Reconciled view
// ---------------------------------------------------------------------------

/// One order joined with its successful-payment and refund aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub success_sum: f64,
    pub first_success_time: Option<NaiveDateTime>,
    pub gateways_used: BTreeSet<String>,
    pub refund_sum: f64,
    pub first_refund_time: Option<NaiveDateTime>,
}

// ---------------------------------------------------------------------------
// Rules + flags
// ---------------------------------------------------------------------------

/// The fixed anomaly catalogue. Declaration order is the canonical order used
/// for every column layout and every explanation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    PaymentMismatch,
    OverRefund,
    LateRefund,
    Offhours,
    Weekend,
    Multigateway,
    OutlierAmount,
    InvalidAmount,
}

impl Rule {
    pub const ALL: [Rule; 8] = [
        Rule::PaymentMismatch,
        Rule::OverRefund,
        Rule::LateRefund,
        Rule::Offhours,
        Rule::Weekend,
        Rule::Multigateway,
        Rule::OutlierAmount,
        Rule::InvalidAmount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentMismatch => "payment_mismatch",
            Self::OverRefund => "over_refund",
            Self::LateRefund => "late_refund",
            Self::Offhours => "offhours",
            Self::Weekend => "weekend",
            Self::Multigateway => "multigateway",
            Self::OutlierAmount => "outlier_amount",
            Self::InvalidAmount => "invalid_amount",
        }
    }

    /// Column name used in tabular artifacts.
    pub fn column(&self) -> &'static str {
        match self {
            Self::PaymentMismatch => "anomaly_payment_mismatch",
            Self::OverRefund => "anomaly_over_refund",
            Self::LateRefund => "anomaly_late_refund",
            Self::Offhours => "anomaly_offhours",
            Self::Weekend => "anomaly_weekend",
            Self::Multigateway => "anomaly_multigateway",
            Self::OutlierAmount => "anomaly_outlier_amount",
            Self::InvalidAmount => "anomaly_invalid_amount",
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One boolean per rule. Off-hours and weekend are always present, false when
/// their detection is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyFlags {
    #[serde(rename = "anomaly_payment_mismatch")]
    pub payment_mismatch: bool,
    #[serde(rename = "anomaly_over_refund")]
    pub over_refund: bool,
    #[serde(rename = "anomaly_late_refund")]
    pub late_refund: bool,
    #[serde(rename = "anomaly_offhours")]
    pub offhours: bool,
    #[serde(rename = "anomaly_weekend")]
    pub weekend: bool,
    #[serde(rename = "anomaly_multigateway")]
    pub multigateway: bool,
    #[serde(rename = "anomaly_outlier_amount")]
    pub outlier_amount: bool,
    #[serde(rename = "anomaly_invalid_amount")]
    pub invalid_amount: bool,
}

impl AnomalyFlags {
    /// Build a flag set by evaluating `check` once per rule, in canonical order.
    pub fn from_fn(mut check: impl FnMut(Rule) -> bool) -> Self {
        Self {
            payment_mismatch: check(Rule::PaymentMismatch),
            over_refund: check(Rule::OverRefund),
            late_refund: check(Rule::LateRefund),
            offhours: check(Rule::Offhours),
            weekend: check(Rule::Weekend),
            multigateway: check(Rule::Multigateway),
            outlier_amount: check(Rule::OutlierAmount),
            invalid_amount: check(Rule::InvalidAmount),
        }
    }

    pub fn get(&self, rule: Rule) -> bool {
        match rule {
            Rule::PaymentMismatch => self.payment_mismatch,
            Rule::OverRefund => self.over_refund,
            Rule::LateRefund => self.late_refund,
            Rule::Offhours => self.offhours,
            Rule::Weekend => self.weekend,
            Rule::Multigateway => self.multigateway,
            Rule::OutlierAmount => self.outlier_amount,
            Rule::InvalidAmount => self.invalid_amount,
        }
    }

    pub fn any(&self) -> bool {
        Rule::ALL.iter().any(|rule| self.get(*rule))
    }

    /// Triggered rules in canonical order.
    pub fn triggered(&self) -> impl Iterator<Item = Rule> + '_ {
        Rule::ALL.into_iter().filter(|rule| self.get(*rule))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedOrderView {
    #[serde(flatten)]
    pub view: OrderView,
    #[serde(flatten)]
    pub flags: AnomalyFlags,
}

impl AnnotatedOrderView {
    pub fn is_anomalous(&self) -> bool {
        self.flags.any()
    }
}

/// Per-rule counts, serialized under the same `anomaly_*` names as the flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyCounts {
    #[serde(rename = "anomaly_payment_mismatch")]
    pub payment_mismatch: usize,
    #[serde(rename = "anomaly_over_refund")]
    pub over_refund: usize,
    #[serde(rename = "anomaly_late_refund")]
    pub late_refund: usize,
    #[serde(rename = "anomaly_offhours")]
    pub offhours: usize,
    #[serde(rename = "anomaly_weekend")]
    pub weekend: usize,
    #[serde(rename = "anomaly_multigateway")]
    pub multigateway: usize,
    #[serde(rename = "anomaly_outlier_amount")]
    pub outlier_amount: usize,
    #[serde(rename = "anomaly_invalid_amount")]
    pub invalid_amount: usize,
}

impl AnomalyCounts {
    /// Counts with every flag of `flags` added, leaving `self` untouched.
    pub fn plus(self, flags: &AnomalyFlags) -> Self {
        let bump = |count: usize, hit: bool| count + usize::from(hit);
        Self {
            payment_mismatch: bump(self.payment_mismatch, flags.payment_mismatch),
            over_refund: bump(self.over_refund, flags.over_refund),
            late_refund: bump(self.late_refund, flags.late_refund),
            offhours: bump(self.offhours, flags.offhours),
            weekend: bump(self.weekend, flags.weekend),
            multigateway: bump(self.multigateway, flags.multigateway),
            outlier_amount: bump(self.outlier_amount, flags.outlier_amount),
            invalid_amount: bump(self.invalid_amount, flags.invalid_amount),
        }
    }

    pub fn get(&self, rule: Rule) -> usize {
        match rule {
            Rule::PaymentMismatch => self.payment_mismatch,
            Rule::OverRefund => self.over_refund,
            Rule::LateRefund => self.late_refund,
            Rule::Offhours => self.offhours,
            Rule::Weekend => self.weekend,
            Rule::Multigateway => self.multigateway,
            Rule::OutlierAmount => self.outlier_amount,
            Rule::InvalidAmount => self.invalid_amount,
        }
    }

    /// Sum over all rules (an order hitting two rules counts twice).
    pub fn total(&self) -> usize {
        Rule::ALL.iter().map(|rule| self.get(*rule)).sum()
    }
}

// ---------------------------------------------------------------------------
// Rollups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub orders_placed: usize,
    pub payments_success_sum: f64,
    pub refunds_sum: f64,
    pub net_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAnomalySummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: AnomalyCounts,
}

/// Daily summary merged with that day's anomaly counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReportRow {
    #[serde(flatten)]
    pub summary: DailySummary,
    #[serde(flatten)]
    pub anomalies: AnomalyCounts,
}

// ---------------------------------------------------------------------------
// Detailed anomalies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReason {
    pub rule: Rule,
    pub reason: &'static str,
    pub evidence: String,
    pub suggested_action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedAnomalyRecord {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub anomalies: Vec<AnomalyReason>,
}

// ---------------------------------------------------------------------------
// Report + Output
// ---------------------------------------------------------------------------

/// Filters actually applied to a run, echoed into the report for audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliedFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub offhours: Option<String>,
    pub weekend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub run_timestamp: String,
    pub engine_version: String,
    pub total_orders: usize,
    pub total_payments: usize,
    pub total_refunds: usize,
    pub filtered_orders: usize,
    pub anomaly_summary: AnomalyCounts,
    pub filters: AppliedFilters,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMeta,
    pub overall_metrics: Vec<DailyReportRow>,
    pub anomaly_counts: AnomalyCounts,
    pub detailed_anomalies: Vec<DetailedAnomalyRecord>,
}

/// Everything one run produces, before serialization.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub annotated: Vec<AnnotatedOrderView>,
    pub daily: Vec<DailyReportRow>,
    pub report: Report,
}

impl RunResult {
    /// Rows with at least one flag set, in order-view order.
    pub fn anomalies(&self) -> impl Iterator<Item = &AnnotatedOrderView> {
        self.annotated.iter().filter(|row| row.is_anomalous())
    }
}
