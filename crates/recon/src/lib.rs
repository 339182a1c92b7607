//! `orderguard-recon`: order/payment/refund reconciliation and anomaly engine.
//!
//! Pure engine crate: parses CSV text into records, reconciles them into one
//! view per order, flags anomalies, and renders the rollups and report. No
//! CLI or filesystem dependencies.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod load;
pub mod model;
pub mod output;
pub mod report;
pub mod rollup;
pub mod rules;
pub mod stats;

pub use config::RunConfig;
pub use engine::run;
pub use error::ReconError;
pub use model::{AnnotatedOrderView, OrderView, Rule, RunInput, RunResult};
