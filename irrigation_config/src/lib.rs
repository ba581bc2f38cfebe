#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the irrigation controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `ConfigChange` is the partial-update schema carried by `config/change`
//!   messages; every field is optional and unknown keys are ignored.
//! - Tank shape, reservoir and report modes accept either their names or the
//!   numeric codes used by the device firmware (e.g. `tank_shape = 2`).
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(try_from = "CodedToml")]
pub enum ReservoirMode {
    /// Pressurized, inexhaustible source only.
    #[default]
    Source,
    /// Exhaustible tank only.
    Tank,
    /// Both reservoirs, switching on exhaustion.
    Both,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(try_from = "CodedToml")]
pub enum TankShape {
    /// length, width, height
    RectangularPrism,
    /// radius, height
    #[default]
    Cylinder,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(try_from = "CodedToml")]
pub enum PressureReportMode {
    Pressure,
    Volume,
    #[default]
    Both,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FirstReservoir {
    #[default]
    Source,
    Tank,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

/// Either a firmware numeric code or a name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodedToml {
    Code(u8),
    Name(String),
}

impl TryFrom<CodedToml> for ReservoirMode {
    type Error = String;
    fn try_from(v: CodedToml) -> Result<Self, Self::Error> {
        match v {
            CodedToml::Code(1) => Ok(Self::Source),
            CodedToml::Code(2) => Ok(Self::Tank),
            CodedToml::Code(3) => Ok(Self::Both),
            CodedToml::Code(n) => Err(format!("unknown reservoir mode code {n}")),
            CodedToml::Name(s) => match s.to_ascii_lowercase().as_str() {
                "source" | "source_only" => Ok(Self::Source),
                "tank" | "tank_only" => Ok(Self::Tank),
                "both" => Ok(Self::Both),
                other => Err(format!("unknown reservoir mode '{other}'")),
            },
        }
    }
}

impl TryFrom<CodedToml> for TankShape {
    type Error = String;
    fn try_from(v: CodedToml) -> Result<Self, Self::Error> {
        match v {
            CodedToml::Code(1) => Ok(Self::RectangularPrism),
            CodedToml::Code(2) => Ok(Self::Cylinder),
            CodedToml::Code(n) => Err(format!("unknown tank shape code {n}")),
            CodedToml::Name(s) => match s.to_ascii_lowercase().as_str() {
                "rectangular_prism" | "prism" | "rectangular" => Ok(Self::RectangularPrism),
                "cylinder" => Ok(Self::Cylinder),
                other => Err(format!("unknown tank shape '{other}'")),
            },
        }
    }
}

impl TryFrom<CodedToml> for PressureReportMode {
    type Error = String;
    fn try_from(v: CodedToml) -> Result<Self, Self::Error> {
        match v {
            CodedToml::Code(1) => Ok(Self::Pressure),
            CodedToml::Code(2) => Ok(Self::Volume),
            CodedToml::Code(3) => Ok(Self::Both),
            CodedToml::Code(n) => Err(format!("unknown pressure report mode code {n}")),
            CodedToml::Name(s) => match s.to_ascii_lowercase().as_str() {
                "pressure" | "pressure_only" => Ok(Self::Pressure),
                "volume" | "volume_only" => Ok(Self::Volume),
                "both" => Ok(Self::Both),
                other => Err(format!("unknown pressure report mode '{other}'")),
            },
        }
    }
}

/// Hardware present on this unit. Fixed at provisioning.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Device {
    pub reservoir_mode: ReservoirMode,
    /// Measure the source with the flow sensor instead of the static rate.
    pub source_flow_sensor: bool,
    pub drain_valve: bool,
    pub pressure_sensor: bool,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            reservoir_mode: ReservoirMode::Source,
            source_flow_sensor: false,
            drain_valve: true,
            pressure_sensor: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub source_valve: u8,
    pub tank_valve: u8,
    pub drain_valve: u8,
    pub flow_sensor: u8,
    /// Many relay boards switch on a low level.
    pub active_low: bool,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            source_valve: 13,
            tank_valve: 12,
            drain_valve: 14,
            flow_sensor: 5,
            active_low: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Dispense {
    /// Volume (liters) between two slice reports
    pub data_resolution_l: f32,
    /// Source flow rate in L/min when the source has no flow sensor
    pub static_flow_rate: f32,
    /// Reservoir opened first when both are connected
    pub first_reservoir: FirstReservoir,
    pub allow_drain_while_dispensing: bool,
}

impl Default for Dispense {
    fn default() -> Self {
        Self {
            data_resolution_l: 0.2,
            static_flow_rate: 12.45,
            first_reservoir: FirstReservoir::Source,
            allow_drain_while_dispensing: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FlowSensorCfg {
    pub pulses_per_l: f32,
    /// L/min; readings above this are treated as a sensor fault
    pub max_flow_rate: f32,
    /// L/min; sustained flow below this marks the reservoir exhausted
    pub min_flow_rate: f32,
}

impl Default for FlowSensorCfg {
    fn default() -> Self {
        Self {
            pulses_per_l: 1265.289,
            max_flow_rate: 30.0,
            min_flow_rate: 0.2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Tank {
    #[serde(alias = "tank_timeout_ms")]
    pub timeout_ms: u64,
    pub shape: TankShape,
    pub dimension_1: f32,
    pub dimension_2: f32,
    pub dimension_3: f32,
}

impl Default for Tank {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            shape: TankShape::Cylinder,
            dimension_1: 0.4,
            dimension_2: 1.2,
            dimension_3: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pressure {
    pub report_mode: PressureReportMode,
    /// Linear coefficient: pressure units per meter of liquid.
    pub pressure_per_m: f32,
    /// Reading at an empty tank.
    pub offset: f32,
    pub read_interval_ms: u64,
}

impl Default for Pressure {
    fn default() -> Self {
        Self {
            report_mode: PressureReportMode::Both,
            pressure_per_m: 9806.65,
            offset: 0.0,
            read_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Sampling {
    /// Flow measurement interval (ms)
    pub interval_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    pub rotation: Rotation,
}

/// Parameters of the simulated plant used when no hardware backend is built.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    /// Initial tank contents in liters; `None` starts the tank full.
    pub tank_level_l: Option<f32>,
    pub source_rate_l_min: f32,
    pub tank_rate_l_min: f32,
    pub drain_rate_l_min: f32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            tank_level_l: None,
            source_rate_l_min: 12.45,
            tank_rate_l_min: 8.0,
            drain_rate_l_min: 20.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub device: Device,
    pub pins: Pins,
    pub dispense: Dispense,
    pub flow_sensor: FlowSensorCfg,
    pub tank: Tank,
    pub pressure: Pressure,
    pub sampling: Sampling,
    pub logging: Logging,
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Partial update of the runtime tunables.
///
/// Absent fields leave the current value untouched; unknown keys are ignored.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ConfigChange {
    pub data_resolution_l: Option<f32>,
    pub static_flow_rate: Option<f32>,
    pub pulses_per_l: Option<f32>,
    pub max_flow_rate: Option<f32>,
    pub min_flow_rate: Option<f32>,
    #[serde(alias = "tank_timeout")]
    pub tank_timeout_ms: Option<u64>,
    #[serde(alias = "shape_type")]
    pub tank_shape: Option<TankShape>,
    pub dimension_1: Option<f32>,
    pub dimension_2: Option<f32>,
    pub dimension_3: Option<f32>,
    #[serde(alias = "report_mode")]
    pub pressure_report_mode: Option<PressureReportMode>,
    pub pressure_per_m: Option<f32>,
    pub pressure_offset: Option<f32>,
    pub first_reservoir: Option<FirstReservoir>,
    pub allow_drain_while_dispensing: Option<bool>,
}

impl ConfigChange {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn load_change_toml(s: &str) -> Result<ConfigChange, toml::de::Error> {
    toml::from_str::<ConfigChange>(s)
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Dispense
        if !positive(self.dispense.data_resolution_l) {
            eyre::bail!("dispense.data_resolution_l must be > 0");
        }
        if !positive(self.dispense.static_flow_rate) {
            eyre::bail!("dispense.static_flow_rate must be > 0");
        }

        // Flow sensor
        if !positive(self.flow_sensor.pulses_per_l) {
            eyre::bail!("flow_sensor.pulses_per_l must be > 0");
        }
        if !positive(self.flow_sensor.min_flow_rate) {
            eyre::bail!("flow_sensor.min_flow_rate must be > 0");
        }
        if !positive(self.flow_sensor.max_flow_rate) {
            eyre::bail!("flow_sensor.max_flow_rate must be > 0");
        }
        if self.flow_sensor.min_flow_rate >= self.flow_sensor.max_flow_rate {
            eyre::bail!("flow_sensor.min_flow_rate must be < flow_sensor.max_flow_rate");
        }

        // Tank
        if self.tank.timeout_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("tank.timeout_ms is unreasonably large (>24h)");
        }
        for (name, v) in [
            ("tank.dimension_1", self.tank.dimension_1),
            ("tank.dimension_2", self.tank.dimension_2),
            ("tank.dimension_3", self.tank.dimension_3),
        ] {
            if !non_negative(v) {
                eyre::bail!("{name} must be >= 0");
            }
        }

        // Pressure
        if !positive(self.pressure.pressure_per_m) {
            eyre::bail!("pressure.pressure_per_m must be > 0");
        }
        if !self.pressure.offset.is_finite() {
            eyre::bail!("pressure.offset must be finite");
        }
        if self.pressure.read_interval_ms == 0 {
            eyre::bail!("pressure.read_interval_ms must be >= 1");
        }

        // Sampling
        if self.sampling.interval_ms == 0 {
            eyre::bail!("sampling.interval_ms must be >= 1");
        }
        if self.sampling.interval_ms > 60_000 {
            eyre::bail!("sampling.interval_ms is unreasonably large (>60s)");
        }

        // Simulation
        if let Some(level) = self.simulation.tank_level_l
            && !non_negative(level)
        {
            eyre::bail!("simulation.tank_level_l must be >= 0");
        }
        for (name, v) in [
            ("simulation.source_rate_l_min", self.simulation.source_rate_l_min),
            ("simulation.tank_rate_l_min", self.simulation.tank_rate_l_min),
            ("simulation.drain_rate_l_min", self.simulation.drain_rate_l_min),
        ] {
            if !non_negative(v) {
                eyre::bail!("{name} must be >= 0");
            }
        }

        Ok(())
    }

    /// True when the unit has an exhaustible tank.
    pub fn has_tank(&self) -> bool {
        matches!(
            self.device.reservoir_mode,
            ReservoirMode::Tank | ReservoirMode::Both
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_firmware_defaults() {
        let cfg = load_toml("").expect("parse");
        assert_eq!(cfg.device.reservoir_mode, ReservoirMode::Source);
        assert!((cfg.dispense.static_flow_rate - 12.45).abs() < 1e-6);
        assert!((cfg.flow_sensor.pulses_per_l - 1265.289).abs() < 1e-3);
        assert_eq!(cfg.tank.timeout_ms, 5000);
        assert_eq!(cfg.tank.shape, TankShape::Cylinder);
        assert_eq!(cfg.pressure.report_mode, PressureReportMode::Both);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn numeric_codes_are_accepted() {
        let cfg = load_toml(
            r#"
[device]
reservoir_mode = 3
[tank]
shape = 1
[pressure]
report_mode = 2
"#,
        )
        .expect("parse");
        assert_eq!(cfg.device.reservoir_mode, ReservoirMode::Both);
        assert_eq!(cfg.tank.shape, TankShape::RectangularPrism);
        assert_eq!(cfg.pressure.report_mode, PressureReportMode::Volume);
    }

    #[test]
    fn unknown_code_is_a_parse_error() {
        let err = load_toml("[tank]\nshape = 7\n").expect_err("bad code");
        assert!(err.to_string().contains("unknown tank shape code 7"));
    }

    #[test]
    fn change_ignores_unknown_keys() {
        let change = load_change_toml("min_flow_rate = 0.5\nmystery = 3\n").expect("parse");
        assert_eq!(change.min_flow_rate, Some(0.5));
        assert!(change.max_flow_rate.is_none());
        assert!(!change.is_empty());
    }
}
