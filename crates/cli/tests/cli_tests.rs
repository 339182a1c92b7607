// End-to-end tests for the `orderguard` binary.
//
// Each test copies the shared CSV fixtures into a fresh temp directory so
// output artifacts never land in the source tree.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn orderguard(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_orderguard"));
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures")
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["orders.csv", "payments.csv", "refunds.csv", "run.toml"] {
        std::fs::copy(fixtures_dir().join(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// orderguard run
// ===========================================================================

#[test]
fn run_with_config_writes_artifacts() {
    let dir = workspace();
    let output = orderguard(dir.path()).args(["run", "run.toml"]).output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty(), "stdout must stay empty without --json");

    let out = dir.path().join("outputs");
    for name in ["summary.csv", "anomalies.csv", "report.json"] {
        assert!(out.join(name).is_file(), "missing {name}");
    }
    let anomalies = std::fs::read_to_string(out.join("anomalies.csv")).unwrap();
    assert_eq!(anomalies.lines().count(), 1 + 5);

    let err = stderr(&output);
    assert!(err.contains("9 of 9 orders"), "stderr: {err}");
    assert!(err.contains("5 anomalous"), "stderr: {err}");
}

#[test]
fn run_json_is_single_report_value() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args(["run", "run.toml", "--json", "--outdir", "out"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["metadata"]["total_orders"], 9);
    assert_eq!(report["metadata"]["filters"]["offhours"], "21:00-09:00");
    assert_eq!(report["detailed_anomalies"].as_array().unwrap().len(), 5);

    let written = std::fs::read_to_string(dir.path().join("out/report.json")).unwrap();
    assert_eq!(written.trim(), stdout.trim());
}

#[test]
fn flags_override_config_filters() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args([
            "run",
            "run.toml",
            "--json",
            "--date-from",
            "2024-01-06",
            "--date-to",
            "2024-01-06",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(report["metadata"]["filtered_orders"], 2);
    assert_eq!(report["metadata"]["filters"]["date_from"], "2024-01-06");
    // Window and weekend toggle still come from the config.
    assert_eq!(report["metadata"]["filters"]["weekend"], true);
    assert_eq!(report["anomaly_counts"]["anomaly_weekend"], 2);
}

#[test]
fn run_without_config_uses_flags() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args([
            "run",
            "--orders",
            "orders.csv",
            "--payments",
            "payments.csv",
            "--refunds",
            "refunds.csv",
            "--outdir",
            "plain",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    // No off-hours window and no weekend toggle: those columns stay false.
    let summary = std::fs::read_to_string(dir.path().join("plain/summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 1 + 6);
    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("plain/report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["anomaly_counts"]["anomaly_offhours"], 0);
    assert_eq!(report["anomaly_counts"]["anomaly_weekend"], 0);
}

// ===========================================================================
// Exit codes
// ===========================================================================

#[test]
fn fail_on_anomaly_exits_5_after_writing() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args(["run", "run.toml", "--fail-on-anomaly"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
    assert!(dir.path().join("outputs/anomalies.csv").is_file());
    assert!(stderr(&output).contains("error: 5 anomalous order(s) found"));
}

#[test]
fn missing_input_exits_2() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args(["run", "--orders", "orders.csv"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn bad_window_exits_3_without_outputs() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args(["run", "run.toml", "--offhours", "9pm-9am"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("offhours"));
    assert!(!dir.path().join("outputs").exists());
}

#[test]
fn inverted_date_range_exits_3() {
    let dir = workspace();
    let output = orderguard(dir.path())
        .args(["run", "run.toml", "--date-from", "2024-02-01", "--date-to", "2024-01-01"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn missing_column_exits_4() {
    let dir = workspace();
    std::fs::write(dir.path().join("refunds.csv"), "refund_id,order_id\nR1,1001\n").unwrap();
    let output = orderguard(dir.path()).args(["run", "run.toml"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("refunds: missing column 'refund_datetime'"));
    assert!(!dir.path().join("outputs").exists());
}

#[test]
fn unreadable_input_exits_4() {
    let dir = workspace();
    std::fs::remove_file(dir.path().join("payments.csv")).unwrap();
    let output = orderguard(dir.path()).args(["run", "run.toml"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("payments.csv"));
}

// ===========================================================================
// orderguard validate
// ===========================================================================

#[test]
fn validate_accepts_fixture_config() {
    let dir = workspace();
    let output = orderguard(dir.path()).args(["validate", "run.toml"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("valid: run 'January fixture'"), "stderr: {err}");
    assert!(err.contains("off-hours 21:00-09:00"), "stderr: {err}");
}

#[test]
fn validate_rejects_unknown_keys() {
    let dir = workspace();
    std::fs::write(dir.path().join("bad.toml"), "[filters]\nweekends = true\n").unwrap();
    let output = orderguard(dir.path()).args(["validate", "bad.toml"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}
