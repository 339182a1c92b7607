//! `orderguard run` / `orderguard validate`: config-driven batch runs.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::Args;
use orderguard_recon::load::{load_orders, load_payments, load_refunds};
use orderguard_recon::output::{render, Artifacts};
use orderguard_recon::{RunConfig, RunInput};

use crate::exit_codes::EXIT_ANOMALIES;
use crate::CliError;

const DEFAULT_OUTDIR: &str = "outputs";

#[derive(Args)]
pub struct RunArgs {
    /// Run config (.toml). Input paths inside it are relative to its directory
    pub config: Option<PathBuf>,

    /// Orders CSV (overrides inputs.orders)
    #[arg(long)]
    pub orders: Option<PathBuf>,

    /// Payments CSV (overrides inputs.payments)
    #[arg(long)]
    pub payments: Option<PathBuf>,

    /// Refunds CSV (overrides inputs.refunds)
    #[arg(long)]
    pub refunds: Option<PathBuf>,

    /// Directory for summary.csv, anomalies.csv and report.json [default: outputs]
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Keep orders placed on or after this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date_from: Option<NaiveDate>,

    /// Keep orders placed on or before this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date_to: Option<NaiveDate>,

    /// Flag orders placed inside this window (wraps midnight when start > end)
    #[arg(long, value_name = "HH:MM-HH:MM")]
    pub offhours: Option<String>,

    /// Flag orders placed on Saturday or Sunday
    #[arg(long)]
    pub weekend: bool,

    /// Print report.json to stdout
    #[arg(long)]
    pub json: bool,

    /// Exit 5 when any order is flagged
    #[arg(long)]
    pub fail_on_anomaly: bool,
}

/// Everything a run needs once config and flags are merged.
#[derive(Debug)]
struct RunPlan {
    config: RunConfig,
    orders: PathBuf,
    payments: PathBuf,
    refunds: PathBuf,
    outdir: PathBuf,
}

fn read_config(path: &Path) -> Result<RunConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::runtime(format!("cannot read config {}: {e}", path.display())))?;
    Ok(RunConfig::from_toml(&config_str)?)
}

/// Flag value wins; otherwise the configured path, relative to the config directory.
fn resolve_input(
    role: &str,
    flag: Option<PathBuf>,
    configured: Option<&str>,
    base_dir: &Path,
) -> Result<PathBuf, CliError> {
    match (flag, configured) {
        (Some(path), _) => Ok(path),
        (None, Some(file)) => Ok(base_dir.join(file)),
        (None, None) => Err(CliError::usage(format!("no {role} file given"))
            .with_hint(format!("pass --{role} or set inputs.{role} in the run config"))),
    }
}

fn plan(args: RunArgs) -> Result<RunPlan, CliError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => RunConfig::default(),
    };
    let base_dir = args
        .config
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if args.date_from.is_some() {
        config.filters.date_from = args.date_from;
    }
    if args.date_to.is_some() {
        config.filters.date_to = args.date_to;
    }
    if args.offhours.is_some() {
        config.filters.offhours = args.offhours;
    }
    config.filters.weekend |= args.weekend;
    // Flags can invalidate a config that parsed fine on its own.
    config.validate()?;

    let inputs = &config.inputs;
    let orders = resolve_input("orders", args.orders, inputs.orders.as_deref(), &base_dir)?;
    let payments = resolve_input("payments", args.payments, inputs.payments.as_deref(), &base_dir)?;
    let refunds = resolve_input("refunds", args.refunds, inputs.refunds.as_deref(), &base_dir)?;

    let outdir = match (args.outdir, config.output.dir.as_deref()) {
        (Some(dir), _) => dir,
        (None, Some(dir)) => base_dir.join(dir),
        (None, None) => PathBuf::from(DEFAULT_OUTDIR),
    };

    Ok(RunPlan {
        config,
        orders,
        payments,
        refunds,
        outdir,
    })
}

fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::runtime(format!("cannot read {}: {e}", path.display())))
}

/// One artifact on its way into the output directory.
struct Staged {
    tmp: PathBuf,
    dest: PathBuf,
    backup: PathBuf,
    backed_up: bool,
    committed: bool,
}

impl Staged {
    fn new(dir: &Path, name: &str) -> Self {
        Self {
            tmp: dir.join(format!(".{name}.tmp")),
            dest: dir.join(name),
            backup: dir.join(format!(".{name}.bak")),
            backed_up: false,
            committed: false,
        }
    }

    /// Move any previous artifact aside, then move the new one into place.
    fn commit(&mut self) -> std::io::Result<()> {
        if self.dest.exists() {
            if self.backup.is_file() {
                std::fs::remove_file(&self.backup)?;
            }
            std::fs::rename(&self.dest, &self.backup)?;
            self.backed_up = true;
        }
        std::fs::rename(&self.tmp, &self.dest)?;
        self.committed = true;
        Ok(())
    }

    /// Best effort: put the previous artifact back and drop the staged one.
    fn roll_back(&self) {
        if self.committed {
            let _ = std::fs::remove_file(&self.dest);
        }
        if self.backed_up {
            let _ = std::fs::rename(&self.backup, &self.dest);
        }
        let _ = std::fs::remove_file(&self.tmp);
    }
}

fn discard(staged: &[Staged]) {
    for entry in staged.iter().rev() {
        entry.roll_back();
    }
}

/// Write all three artifacts or none of them.
///
/// Every artifact is staged as a hidden temp file first. Previous artifacts are
/// moved aside while the new ones are renamed into place and restored if any
/// step fails; staged temp files never survive an error.
pub fn write_artifacts(dir: &Path, artifacts: &Artifacts) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut staged: Vec<Staged> = Vec::new();
    for (name, contents) in artifacts.files() {
        let entry = Staged::new(dir, name);
        if entry.dest.exists() && !entry.dest.is_file() {
            discard(&staged);
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a regular file", entry.dest.display()),
            ));
        }
        if let Err(e) = std::fs::write(&entry.tmp, contents) {
            discard(&staged);
            let _ = std::fs::remove_file(&entry.tmp);
            return Err(e);
        }
        staged.push(entry);
    }

    if let Err(e) = staged.iter_mut().try_for_each(Staged::commit) {
        discard(&staged);
        return Err(e);
    }

    for entry in &staged {
        if entry.backed_up {
            let _ = std::fs::remove_file(&entry.backup);
        }
    }
    Ok(staged.into_iter().map(|entry| entry.dest).collect())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let json_output = args.json;
    let fail_on_anomaly = args.fail_on_anomaly;
    let plan = plan(args)?;
    log::debug!(
        "inputs: orders={} payments={} refunds={} outdir={}",
        plan.orders.display(),
        plan.payments.display(),
        plan.refunds.display(),
        plan.outdir.display()
    );

    let input = RunInput {
        orders: load_orders(&read_input(&plan.orders)?)?,
        payments: load_payments(&read_input(&plan.payments)?)?,
        refunds: load_refunds(&read_input(&plan.refunds)?)?,
    };

    let result = orderguard_recon::run(&plan.config, &input, Utc::now())?;
    let artifacts = render(&result)?;

    write_artifacts(&plan.outdir, &artifacts).map_err(|e| {
        CliError::runtime(format!("cannot write outputs to {}: {e}", plan.outdir.display()))
    })?;

    if json_output {
        println!("{}", artifacts.report_json);
    }

    // Human summary to stderr
    let meta = &result.report.metadata;
    let anomalous = result.report.detailed_anomalies.len();
    eprintln!(
        "{} of {} orders reconciled over {} day(s): {} anomalous, {} flag(s)",
        meta.filtered_orders,
        meta.total_orders,
        result.daily.len(),
        anomalous,
        result.report.anomaly_counts.total(),
    );
    eprintln!("wrote {}", plan.outdir.display());

    if fail_on_anomaly && anomalous > 0 {
        return Err(CliError {
            code: EXIT_ANOMALIES,
            message: format!("{anomalous} anomalous order(s) found"),
            hint: Some(format!("see {}", plan.outdir.join("anomalies.csv").display())),
        });
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let filters = config.filters.resolve()?.applied;

    let window = filters.offhours.as_deref().unwrap_or("off");
    let range = match (filters.date_from, filters.date_to) {
        (None, None) => "all dates".to_string(),
        (from, to) => format!(
            "{} to {}",
            from.map_or_else(|| "start".to_string(), |d| d.to_string()),
            to.map_or_else(|| "end".to_string(), |d| d.to_string())
        ),
    };
    eprintln!(
        "valid: run '{}' ({range}, off-hours {window}, weekend {})",
        config.name.as_deref().unwrap_or("unnamed"),
        if filters.weekend { "on" } else { "off" },
    );
    Ok(())
}
