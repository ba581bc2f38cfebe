//! `From` implementations bridging `irrigation_config` types to core types.

use crate::config::{
    ConfigPatch, DeviceProfile, PressureReportMode, Reservoir, ReservoirMode, RuntimeConfig,
    TankShape,
};

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<irrigation_config::ReservoirMode> for ReservoirMode {
    fn from(m: irrigation_config::ReservoirMode) -> Self {
        match m {
            irrigation_config::ReservoirMode::Source => ReservoirMode::SourceOnly,
            irrigation_config::ReservoirMode::Tank => ReservoirMode::TankOnly,
            irrigation_config::ReservoirMode::Both => ReservoirMode::Both,
        }
    }
}

impl From<irrigation_config::TankShape> for TankShape {
    fn from(s: irrigation_config::TankShape) -> Self {
        match s {
            irrigation_config::TankShape::RectangularPrism => TankShape::RectangularPrism,
            irrigation_config::TankShape::Cylinder => TankShape::Cylinder,
        }
    }
}

impl From<irrigation_config::PressureReportMode> for PressureReportMode {
    fn from(m: irrigation_config::PressureReportMode) -> Self {
        match m {
            irrigation_config::PressureReportMode::Pressure => PressureReportMode::PressureOnly,
            irrigation_config::PressureReportMode::Volume => PressureReportMode::VolumeOnly,
            irrigation_config::PressureReportMode::Both => PressureReportMode::Both,
        }
    }
}

impl From<irrigation_config::FirstReservoir> for Reservoir {
    fn from(r: irrigation_config::FirstReservoir) -> Self {
        match r {
            irrigation_config::FirstReservoir::Source => Reservoir::Source,
            irrigation_config::FirstReservoir::Tank => Reservoir::Tank,
        }
    }
}

// ── RuntimeConfig ────────────────────────────────────────────────────────────

impl From<&irrigation_config::Config> for RuntimeConfig {
    fn from(c: &irrigation_config::Config) -> Self {
        Self {
            data_resolution_l: c.dispense.data_resolution_l,
            static_flow_rate: c.dispense.static_flow_rate,
            pulses_per_l: c.flow_sensor.pulses_per_l,
            max_flow_rate: c.flow_sensor.max_flow_rate,
            min_flow_rate: c.flow_sensor.min_flow_rate,
            tank_timeout_ms: c.tank.timeout_ms,
            tank_shape: c.tank.shape.into(),
            dimension_1: c.tank.dimension_1,
            dimension_2: c.tank.dimension_2,
            dimension_3: c.tank.dimension_3,
            pressure_report_mode: c.pressure.report_mode.into(),
            pressure_per_m: c.pressure.pressure_per_m,
            pressure_offset: c.pressure.offset,
            first_reservoir: c.dispense.first_reservoir.into(),
            allow_drain_while_dispensing: c.dispense.allow_drain_while_dispensing,
        }
    }
}

// ── DeviceProfile ────────────────────────────────────────────────────────────

impl From<&irrigation_config::Device> for DeviceProfile {
    fn from(d: &irrigation_config::Device) -> Self {
        Self {
            reservoir_mode: d.reservoir_mode.into(),
            source_flow_sensor: d.source_flow_sensor,
            drain_valve: d.drain_valve,
            pressure_sensor: d.pressure_sensor,
        }
    }
}

// ── ConfigPatch ──────────────────────────────────────────────────────────────

impl From<&irrigation_config::ConfigChange> for ConfigPatch {
    fn from(c: &irrigation_config::ConfigChange) -> Self {
        Self {
            data_resolution_l: c.data_resolution_l,
            static_flow_rate: c.static_flow_rate,
            pulses_per_l: c.pulses_per_l,
            max_flow_rate: c.max_flow_rate,
            min_flow_rate: c.min_flow_rate,
            tank_timeout_ms: c.tank_timeout_ms,
            tank_shape: c.tank_shape.map(Into::into),
            dimension_1: c.dimension_1,
            dimension_2: c.dimension_2,
            dimension_3: c.dimension_3,
            pressure_report_mode: c.pressure_report_mode.map(Into::into),
            pressure_per_m: c.pressure_per_m,
            pressure_offset: c.pressure_offset,
            first_reservoir: c.first_reservoir.map(Into::into),
            allow_drain_while_dispensing: c.allow_drain_while_dispensing,
        }
    }
}
