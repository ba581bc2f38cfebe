use std::fs;

use irrigation_config::{
    FirstReservoir, ReservoirMode, Rotation, TankShape, load_change_toml, load_toml,
};
use rstest::rstest;
use tempfile::tempdir;

const FULL: &str = r#"
[device]
reservoir_mode = "both"
source_flow_sensor = true
drain_valve = true
pressure_sensor = true

[pins]
source_valve = 13
tank_valve = 12
drain_valve = 14
flow_sensor = 5
active_low = true

[dispense]
data_resolution_l = 0.5
static_flow_rate = 10.0
first_reservoir = "tank"

[flow_sensor]
pulses_per_l = 450.0
max_flow_rate = 30.0
min_flow_rate = 0.2

[tank]
timeout_ms = 3000
shape = "rectangular_prism"
dimension_1 = 1.0
dimension_2 = 0.5
dimension_3 = 0.8

[pressure]
report_mode = "volume"
pressure_per_m = 9806.65
offset = 120.0
read_interval_ms = 500

[sampling]
interval_ms = 100

[logging]
file = "irrigation.log"
level = "debug"
rotation = "daily"
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.device.reservoir_mode, ReservoirMode::Both);
    assert_eq!(cfg.dispense.first_reservoir, FirstReservoir::Tank);
    assert_eq!(cfg.tank.shape, TankShape::RectangularPrism);
    assert_eq!(cfg.logging.rotation, Rotation::Daily);
    assert!(cfg.pins.active_low);
    assert!(cfg.has_tank());
}

#[rstest]
#[case("[dispense]\ndata_resolution_l = 0.0\n", "data_resolution_l must be > 0")]
#[case("[dispense]\nstatic_flow_rate = -1.0\n", "static_flow_rate must be > 0")]
#[case("[flow_sensor]\npulses_per_l = 0.0\n", "pulses_per_l must be > 0")]
#[case(
    "[flow_sensor]\nmin_flow_rate = 5.0\nmax_flow_rate = 5.0\n",
    "min_flow_rate must be < flow_sensor.max_flow_rate"
)]
#[case("[tank]\ndimension_1 = -0.1\n", "tank.dimension_1 must be >= 0")]
#[case("[pressure]\npressure_per_m = 0.0\n", "pressure_per_m must be > 0")]
#[case("[pressure]\nread_interval_ms = 0\n", "read_interval_ms must be >= 1")]
#[case("[sampling]\ninterval_ms = 0\n", "sampling.interval_ms must be >= 1")]
#[case("[simulation]\ntank_level_l = -2.0\n", "tank_level_l must be >= 0")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn rejects_unknown_enum_name() {
    let err = load_toml("[device]\nreservoir_mode = \"lake\"\n").expect_err("bad mode");
    assert!(format!("{err}").contains("unknown reservoir mode 'lake'"));
}

#[test]
fn loads_from_file_on_disk() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("irrigation.toml");
    fs::write(&path, FULL).expect("write");
    let text = fs::read_to_string(&path).expect("read");
    let cfg = load_toml(&text).expect("parse TOML");
    assert_eq!(cfg.sampling.interval_ms, 100);
}

#[rstest]
#[case("tank_timeout = 7000\n", 7000)]
#[case("tank_timeout_ms = 9000\n", 9000)]
fn change_accepts_firmware_key_aliases(#[case] toml: &str, #[case] expected: u64) {
    let change = load_change_toml(toml).expect("parse change");
    assert_eq!(change.tank_timeout_ms, Some(expected));
}

#[test]
fn empty_change_is_empty() {
    let change = load_change_toml("").expect("parse change");
    assert!(change.is_empty());
}

#[test]
fn change_decodes_shape_by_code() {
    let change = load_change_toml("shape_type = 1\ndimension_3 = 0.9\n").expect("parse change");
    assert_eq!(change.tank_shape, Some(TankShape::RectangularPrism));
    assert_eq!(change.dimension_3, Some(0.9));
}
