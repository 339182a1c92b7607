//! Artifact rendering. Everything is rendered to memory so a caller can
//! write all three files or none.

use chrono::NaiveDateTime;

use crate::error::ReconError;
use crate::model::{AnnotatedOrderView, DailyReportRow, Rule, RunResult};

pub const SUMMARY_FILE: &str = "summary.csv";
pub const ANOMALIES_FILE: &str = "anomalies.csv";
pub const REPORT_FILE: &str = "report.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct Artifacts {
    pub summary_csv: String,
    pub anomalies_csv: String,
    pub report_json: String,
}

impl Artifacts {
    /// (file name, contents) pairs in write order.
    pub fn files(&self) -> [(&'static str, &str); 3] {
        [
            (SUMMARY_FILE, self.summary_csv.as_str()),
            (ANOMALIES_FILE, self.anomalies_csv.as_str()),
            (REPORT_FILE, self.report_json.as_str()),
        ]
    }
}

pub fn render(result: &RunResult) -> Result<Artifacts, ReconError> {
    let anomalies: Vec<&AnnotatedOrderView> = result.anomalies().collect();
    Ok(Artifacts {
        summary_csv: summary_csv(&result.daily)?,
        anomalies_csv: anomalies_csv(&anomalies)?,
        report_json: serde_json::to_string_pretty(&result.report)
            .map_err(|e| ReconError::Render(format!("report.json: {e}")))?,
    })
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

fn opt_money(v: Option<f64>) -> String {
    v.map(money).unwrap_or_default()
}

fn opt_time(v: Option<NaiveDateTime>) -> String {
    v.map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn finish(writer: csv::Writer<Vec<u8>>, name: &str) -> Result<String, ReconError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReconError::Render(format!("{name}: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Render(format!("{name}: {e}")))
}

pub fn summary_csv(rows: &[DailyReportRow]) -> Result<String, ReconError> {
    let err = |e: csv::Error| ReconError::Render(format!("{SUMMARY_FILE}: {e}"));
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "date",
        "orders_placed",
        "payments_success_sum",
        "refunds_sum",
        "net_revenue",
    ];
    header.extend(Rule::ALL.iter().map(Rule::column));
    writer.write_record(&header).map_err(err)?;

    for row in rows {
        let s = &row.summary;
        let mut record = vec![
            s.date.to_string(),
            s.orders_placed.to_string(),
            money(s.payments_success_sum),
            money(s.refunds_sum),
            money(s.net_revenue),
        ];
        record.extend(Rule::ALL.iter().map(|rule| row.anomalies.get(*rule).to_string()));
        writer.write_record(&record).map_err(err)?;
    }

    finish(writer, SUMMARY_FILE)
}

pub fn anomalies_csv(rows: &[&AnnotatedOrderView]) -> Result<String, ReconError> {
    let err = |e: csv::Error| ReconError::Render(format!("{ANOMALIES_FILE}: {e}"));
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "order_id",
        "order_datetime",
        "order_amount",
        "customer_id",
        "success_sum",
        "first_success_time",
        "gateways_used",
        "refund_sum",
        "first_refund_time",
    ];
    header.extend(Rule::ALL.iter().map(Rule::column));
    writer.write_record(&header).map_err(err)?;

    for row in rows {
        let v = &row.view;
        let mut record = vec![
            v.order.order_id.clone(),
            opt_time(v.order.order_datetime),
            opt_money(v.order.order_amount),
            v.order.customer_id.clone().unwrap_or_default(),
            money(v.success_sum),
            opt_time(v.first_success_time),
            v.gateways_used
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(";"),
            money(v.refund_sum),
            opt_time(v.first_refund_time),
        ];
        record.extend(Rule::ALL.iter().map(|rule| row.flags.get(*rule).to_string()));
        writer.write_record(&record).map_err(err)?;
    }

    finish(writer, ANOMALIES_FILE)
}
