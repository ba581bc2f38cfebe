//! Runtime configuration for the irrigation engine.
//!
//! These are the core's own types, separate from the TOML schema in
//! `irrigation_config`. `RuntimeConfig` holds the tunables that may change
//! while the controller runs; `DeviceProfile` describes the hardware fitted at
//! provisioning and never changes. Updates go through `ConfigStore`, which
//! validates a patched copy and swaps the whole snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::IrrigationError;
use crate::estimator::MeasureMode;

/// Which reservoirs the unit is plumbed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservoirMode {
    #[default]
    SourceOnly,
    TankOnly,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reservoir {
    /// Pressurized, inexhaustible supply.
    Source,
    /// Exhaustible tank.
    Tank,
}

impl Reservoir {
    pub fn as_str(self) -> &'static str {
        match self {
            Reservoir::Source => "source",
            Reservoir::Tank => "tank",
        }
    }

    pub fn valve(self) -> irrigation_traits::ValveId {
        match self {
            Reservoir::Source => irrigation_traits::ValveId::Source,
            Reservoir::Tank => irrigation_traits::ValveId::Tank,
        }
    }

    pub fn other(self) -> Reservoir {
        match self {
            Reservoir::Source => Reservoir::Tank,
            Reservoir::Tank => Reservoir::Source,
        }
    }
}

impl std::fmt::Display for Reservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TankShape {
    /// (length, width, height)
    RectangularPrism,
    /// (radius, height, unused)
    #[default]
    Cylinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressureReportMode {
    PressureOnly,
    VolumeOnly,
    #[default]
    Both,
}

impl TankShape {
    pub fn as_str(self) -> &'static str {
        match self {
            TankShape::RectangularPrism => "rectangular_prism",
            TankShape::Cylinder => "cylinder",
        }
    }
}

impl PressureReportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PressureReportMode::PressureOnly => "pressure",
            PressureReportMode::VolumeOnly => "volume",
            PressureReportMode::Both => "both",
        }
    }

    pub fn includes_volume(self) -> bool {
        !matches!(self, PressureReportMode::PressureOnly)
    }
}

/// Mutable tunables shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Volume (L) between two slice reports.
    pub data_resolution_l: f32,
    /// L/min assumed for a reservoir with no flow sensor.
    pub static_flow_rate: f32,
    pub pulses_per_l: f32,
    /// L/min; pulse-measured rates above this are sensor faults.
    pub max_flow_rate: f32,
    /// L/min; sustained flow below this marks exhaustion.
    pub min_flow_rate: f32,
    /// How long flow must stay below `min_flow_rate` before the reservoir is exhausted.
    pub tank_timeout_ms: u64,
    pub tank_shape: TankShape,
    /// Meters. Prism: length, width, height. Cylinder: radius, height, unused.
    pub dimension_1: f32,
    pub dimension_2: f32,
    pub dimension_3: f32,
    pub pressure_report_mode: PressureReportMode,
    /// Pressure units per meter of liquid column.
    pub pressure_per_m: f32,
    /// Pressure reading at zero height.
    pub pressure_offset: f32,
    /// Reservoir opened first in `Both` mode.
    pub first_reservoir: Reservoir,
    pub allow_drain_while_dispensing: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_resolution_l: 0.2,
            static_flow_rate: 12.45,
            pulses_per_l: 1265.289,
            max_flow_rate: 30.0,
            min_flow_rate: 0.2,
            tank_timeout_ms: 5_000,
            tank_shape: TankShape::Cylinder,
            dimension_1: 0.4,
            dimension_2: 1.2,
            dimension_3: 0.0,
            pressure_report_mode: PressureReportMode::Both,
            pressure_per_m: 9_806.65,
            pressure_offset: 0.0,
            first_reservoir: Reservoir::Source,
            allow_drain_while_dispensing: false,
        }
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), IrrigationError> {
        if !positive(self.data_resolution_l) {
            return Err(IrrigationError::validation("data_resolution_l must be > 0"));
        }
        if !positive(self.static_flow_rate) {
            return Err(IrrigationError::validation("static_flow_rate must be > 0"));
        }
        if !positive(self.pulses_per_l) {
            return Err(IrrigationError::validation("pulses_per_l must be > 0"));
        }
        if !positive(self.min_flow_rate) {
            return Err(IrrigationError::validation("min_flow_rate must be > 0"));
        }
        if !self.max_flow_rate.is_finite() || self.min_flow_rate >= self.max_flow_rate {
            return Err(IrrigationError::validation(
                "min_flow_rate must be < max_flow_rate",
            ));
        }
        for (name, v) in [
            ("dimension_1", self.dimension_1),
            ("dimension_2", self.dimension_2),
            ("dimension_3", self.dimension_3),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(IrrigationError::Validation(format!("{name} must be >= 0")));
            }
        }
        if !positive(self.pressure_per_m) {
            return Err(IrrigationError::validation("pressure_per_m must be > 0"));
        }
        if !self.pressure_offset.is_finite() {
            return Err(IrrigationError::validation("pressure_offset must be finite"));
        }
        Ok(())
    }

    /// Copy `self`, apply `patch`, and validate the result. `self` is untouched.
    pub fn patched(&self, patch: &ConfigPatch) -> Result<RuntimeConfig, IrrigationError> {
        let mut next = self.clone();
        if let Some(v) = patch.data_resolution_l {
            next.data_resolution_l = v;
        }
        if let Some(v) = patch.static_flow_rate {
            next.static_flow_rate = v;
        }
        if let Some(v) = patch.pulses_per_l {
            next.pulses_per_l = v;
        }
        if let Some(v) = patch.max_flow_rate {
            next.max_flow_rate = v;
        }
        if let Some(v) = patch.min_flow_rate {
            next.min_flow_rate = v;
        }
        if let Some(v) = patch.tank_timeout_ms {
            next.tank_timeout_ms = v;
        }
        if let Some(v) = patch.tank_shape {
            next.tank_shape = v;
        }
        if let Some(v) = patch.dimension_1 {
            next.dimension_1 = v;
        }
        if let Some(v) = patch.dimension_2 {
            next.dimension_2 = v;
        }
        if let Some(v) = patch.dimension_3 {
            next.dimension_3 = v;
        }
        if let Some(v) = patch.pressure_report_mode {
            next.pressure_report_mode = v;
        }
        if let Some(v) = patch.pressure_per_m {
            next.pressure_per_m = v;
        }
        if let Some(v) = patch.pressure_offset {
            next.pressure_offset = v;
        }
        if let Some(v) = patch.first_reservoir {
            next.first_reservoir = v;
        }
        if let Some(v) = patch.allow_drain_while_dispensing {
            next.allow_drain_while_dispensing = v;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub data_resolution_l: Option<f32>,
    pub static_flow_rate: Option<f32>,
    pub pulses_per_l: Option<f32>,
    pub max_flow_rate: Option<f32>,
    pub min_flow_rate: Option<f32>,
    pub tank_timeout_ms: Option<u64>,
    pub tank_shape: Option<TankShape>,
    pub dimension_1: Option<f32>,
    pub dimension_2: Option<f32>,
    pub dimension_3: Option<f32>,
    pub pressure_report_mode: Option<PressureReportMode>,
    pub pressure_per_m: Option<f32>,
    pub pressure_offset: Option<f32>,
    pub first_reservoir: Option<Reservoir>,
    pub allow_drain_while_dispensing: Option<bool>,
}

/// Hardware fitted at provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    pub reservoir_mode: ReservoirMode,
    /// The source is measured by the flow sensor rather than the static rate.
    pub source_flow_sensor: bool,
    pub drain_valve: bool,
    pub pressure_sensor: bool,
}

impl DeviceProfile {
    pub fn has_tank(&self) -> bool {
        matches!(
            self.reservoir_mode,
            ReservoirMode::TankOnly | ReservoirMode::Both
        )
    }

    pub fn has_source(&self) -> bool {
        matches!(
            self.reservoir_mode,
            ReservoirMode::SourceOnly | ReservoirMode::Both
        )
    }

    pub fn drain_supported(&self) -> bool {
        self.has_tank() && self.drain_valve
    }

    pub fn pressure_supported(&self) -> bool {
        self.has_tank() && self.pressure_sensor
    }

    /// The tank always runs through the flow sensor.
    pub fn measure_mode(&self, reservoir: Reservoir) -> MeasureMode {
        match reservoir {
            Reservoir::Tank => MeasureMode::Pulses,
            Reservoir::Source if self.source_flow_sensor => MeasureMode::Pulses,
            Reservoir::Source => MeasureMode::Static,
        }
    }
}

/// Shared, swap-on-write holder of the current `RuntimeConfig`.
///
/// Readers take an `Arc` snapshot and never see a half-applied patch.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<RuntimeConfig>>>,
    baseline: Arc<RuntimeConfig>,
}

impl ConfigStore {
    /// Validate `initial` and use it as both the current value and the reset baseline.
    pub fn new(initial: RuntimeConfig) -> Result<Self, IrrigationError> {
        initial.validate()?;
        let baseline = Arc::new(initial);
        Ok(Self {
            current: Arc::new(RwLock::new(baseline.clone())),
            baseline,
        })
    }

    pub fn snapshot(&self) -> Arc<RuntimeConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a patch atomically; on error nothing changes.
    pub fn apply(&self, patch: &ConfigPatch) -> Result<Arc<RuntimeConfig>, IrrigationError> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(guard.patched(patch)?);
        *guard = next.clone();
        Ok(next)
    }

    /// Restore the baseline the store was created with.
    pub fn reset(&self) -> Result<Arc<RuntimeConfig>, IrrigationError> {
        self.baseline.validate()?;
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = self.baseline.clone();
        Ok(self.baseline.clone())
    }
}
