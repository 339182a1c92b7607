//! CSV record loading: typing, coercion of unparseable values to unknown,
//! exact-duplicate removal, and dropping rows without their required keys.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::error::ReconError;
use crate::model::{Order, Payment, PaymentStatus, Refund};

/// Accepted datetime layouts, tried in order. The first is the export format
/// of the upstream order system.
const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

struct Table {
    source: &'static str,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    fn read(source: &'static str, csv_data: &str) -> Result<Self, ReconError> {
        let csv_err = |e: csv::Error| ReconError::Csv {
            source: source.into(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut records = Vec::new();
        let mut duplicates = 0usize;
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if seen.insert(record.iter().map(str::to_string).collect()) {
                records.push(record);
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            log::debug!("{source}: dropped {duplicates} duplicate row(s)");
        }

        Ok(Self {
            source,
            headers,
            records,
        })
    }

    fn required(&self, column: &str) -> Result<usize, ReconError> {
        self.optional(column).ok_or_else(|| ReconError::MissingColumn {
            source: self.source.into(),
            column: column.into(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

fn field(record: &csv::StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).filter(|v| !v.is_empty())
}

fn text(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| field(record, i)).map(str::to_string)
}

/// Parse a timestamp in any accepted layout; anything else is unknown.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse an amount; blank, malformed and non-finite values are unknown.
pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn report_dropped(source: &str, missing_keys: usize) {
    if missing_keys > 0 {
        log::warn!("{source}: dropped {missing_keys} row(s) missing a required key");
    }
}

pub fn load_orders(csv_data: &str) -> Result<Vec<Order>, ReconError> {
    let table = Table::read("orders", csv_data)?;
    let id_idx = table.required("order_id")?;
    let datetime_idx = table.required("order_datetime")?;
    let amount_idx = table.required("order_amount")?;
    let customer_idx = table.optional("customer_id");

    let mut missing_keys = 0;
    let orders: Vec<Order> = table
        .records
        .iter()
        .filter_map(|record| {
            let Some(order_id) = field(record, id_idx) else {
                missing_keys += 1;
                return None;
            };
            Some(Order {
                order_id: order_id.to_string(),
                order_datetime: field(record, datetime_idx).and_then(parse_datetime),
                order_amount: field(record, amount_idx).and_then(parse_amount),
                customer_id: text(record, customer_idx),
            })
        })
        .collect();

    report_dropped(table.source, missing_keys);
    Ok(orders)
}

pub fn load_payments(csv_data: &str) -> Result<Vec<Payment>, ReconError> {
    let table = Table::read("payments", csv_data)?;
    let id_idx = table.required("payment_id")?;
    let order_idx = table.required("order_id")?;
    let datetime_idx = table.required("payment_datetime")?;
    let amount_idx = table.required("paid_amount")?;
    let status_idx = table.required("payment_status")?;
    let gateway_idx = table.optional("gateway");

    let mut missing_keys = 0;
    let payments: Vec<Payment> = table
        .records
        .iter()
        .filter_map(|record| {
            let (Some(payment_id), Some(order_id)) = (field(record, id_idx), field(record, order_idx))
            else {
                missing_keys += 1;
                return None;
            };
            Some(Payment {
                payment_id: payment_id.to_string(),
                order_id: order_id.to_string(),
                payment_datetime: field(record, datetime_idx).and_then(parse_datetime),
                paid_amount: field(record, amount_idx).and_then(parse_amount),
                payment_status: PaymentStatus::parse(field(record, status_idx).unwrap_or("")),
                gateway: text(record, gateway_idx),
            })
        })
        .collect();

    report_dropped(table.source, missing_keys);
    Ok(payments)
}

pub fn load_refunds(csv_data: &str) -> Result<Vec<Refund>, ReconError> {
    let table = Table::read("refunds", csv_data)?;
    let id_idx = table.required("refund_id")?;
    let order_idx = table.required("order_id")?;
    let datetime_idx = table.required("refund_datetime")?;
    let amount_idx = table.required("refund_amount")?;

    let mut missing_keys = 0;
    let refunds: Vec<Refund> = table
        .records
        .iter()
        .filter_map(|record| {
            let (Some(refund_id), Some(order_id)) = (field(record, id_idx), field(record, order_idx))
            else {
                missing_keys += 1;
                return None;
            };
            Some(Refund {
                refund_id: refund_id.to_string(),
                order_id: order_id.to_string(),
                refund_datetime: field(record, datetime_idx).and_then(parse_datetime),
                refund_amount: field(record, amount_idx).and_then(parse_amount),
            })
        })
        .collect();

    report_dropped(table.source, missing_keys);
    Ok(refunds)
}
