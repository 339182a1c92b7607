// orderguard CLI - batch order/payment/refund reconciliation and anomaly report

mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use orderguard_recon::ReconError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "orderguard")]
#[command(about = "Reconcile orders against payments and refunds, and flag anomalies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one batch and write summary.csv, anomalies.csv and report.json
    #[command(after_help = "\
Examples:
  orderguard run run.toml
  orderguard run --orders orders.csv --payments payments.csv --refunds refunds.csv
  orderguard run run.toml --date-from 2024-01-01 --date-to 2024-01-31 --outdir out
  orderguard run run.toml --offhours 21:00-09:00 --weekend --json
  orderguard run run.toml --fail-on-anomaly")]
    Run(run::RunArgs),

    /// Validate a run config without reading any data
    #[command(after_help = "\
Examples:
  orderguard validate run.toml")]
    Validate {
        /// Path to the run config (.toml)
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    // stdout is reserved for --json output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args),
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = &e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RUNTIME, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match &err {
            e if e.is_config() => Self::config(err.to_string()),
            ReconError::MissingColumn { .. } | ReconError::Csv { .. } => {
                Self::runtime(err.to_string())
            }
            _ => Self::general(err.to_string()),
        }
    }
}
