use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const SOURCE_ONLY: &str = r#"
[device]
reservoir_mode = "source"
source_flow_sensor = false

[dispense]
data_resolution_l = 0.5
static_flow_rate = 12.0

[sampling]
interval_ms = 250
"#;

// Tank only, nearly empty: flow stops soon after the valve opens.
const DRY_TANK: &str = r#"
[device]
reservoir_mode = 2
pressure_sensor = true
drain_valve = true

[tank]
timeout_ms = 1000

[simulation]
tank_level_l = 0.3
tank_rate_l_min = 8.0
"#;

const DRAINABLE_TANK: &str = r#"
[device]
reservoir_mode = "tank"
pressure_sensor = true
drain_valve = true

[pressure]
read_interval_ms = 1000

[simulation]
tank_level_l = 30.0
drain_rate_l_min = 20.0
"#;

fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
    let path = dir.path().join("irrigation.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn cli(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("irrigation_cli").unwrap();
    // Simulated time: dispensations finish without waiting in real time.
    cmd.env("IRRIGATION_SIM_FAST", "1");
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["dispense", "--liters", "2"], 0, "completed", "stdout")]
#[case(&["dispense"], 2, "required", "stderr")]
#[case(&["dispense", "--liters", "0"], 1, "nothing was actuated", "stderr")]
#[case(&["drain"], 1, "cannot do that", "stderr")]
#[case(&["config"], 0, "static_flow_rate = 12", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, SOURCE_ONLY);

    let mut cmd = cli(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn dispense_prints_slices_before_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, SOURCE_ONLY);

    let out = cli(&cfg)
        .args(["dispense", "--liters", "2", "--id", "bed-3"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<&str> = stdout.lines().collect();
    // 2 L at 0.5 L resolution: 3 or 4 slices, then the summary
    let slices = lines.iter().filter(|l| l.contains("L/min")).count();
    assert!((3..=4).contains(&slices), "{stdout}");
    let last = lines.last().copied().unwrap_or("");
    assert!(last.contains("dispense 'bed-3' completed"), "{stdout}");
}

#[rstest]
fn dry_tank_exits_with_no_reservoir_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, DRY_TANK);

    cli(&cfg)
        .args(["dispense", "--liters", "5"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ran dry"));
}

#[rstest]
fn drain_closes_itself_when_tank_empties() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, DRAINABLE_TANK);

    cli(&cfg)
        .args(["drain", "--max-secs", "600"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drain open"))
        .stdout(predicate::str::contains("drain closed"));
}

#[rstest]
fn drain_time_limit_closes_valve() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, DRAINABLE_TANK);

    let out = cli(&cfg)
        .args(["drain", "--max-secs", "10"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    assert!(stdout.lines().last().unwrap_or("").starts_with("drain closed"), "{stdout}");
}

#[rstest]
#[case("[dispense]\ndata_resolution_l = 0.0\n", "data_resolution_l must be > 0")]
#[case("[device]\nreservoir_mode = \"lake\"\n", "not valid TOML")]
fn cli_reports_bad_config(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, toml);

    cli(&cfg)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("nope.toml");

    cli(&cfg)
        .arg("config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}
