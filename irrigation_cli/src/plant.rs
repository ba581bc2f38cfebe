//! Device assembly: the simulated plant by default, GPIO with `--features hardware`.

use std::sync::Arc;

use eyre::Result;
use irrigation_config::Config;
use irrigation_core::{Controller, DeviceProfile, ReportSink, RuntimeConfig, TankGeometry};
use irrigation_hardware::PlantParams;
use irrigation_traits::{
    Clock, FlowSensor, ManualClock, MonotonicClock, PressureSensor, ValveDriver,
};

/// Run the simulation on a clock that only moves when the sampler sleeps.
/// Used by tests to finish multi-minute dispensations instantly.
pub const SIM_FAST_ENV: &str = "IRRIGATION_SIM_FAST";

/// Fallback level when neither `[simulation]` nor the tank height gives one.
const DEFAULT_SIM_TANK_L: f32 = 100.0;

pub struct Devices {
    pub valves: Box<dyn ValveDriver + Send>,
    pub flow: Box<dyn FlowSensor + Send>,
    pub pressure: Option<Box<dyn PressureSensor + Send>>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

fn clock() -> Arc<dyn Clock + Send + Sync> {
    if std::env::var_os(SIM_FAST_ENV).is_some() {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

/// Plant parameters derived from the config so the simulated tank reads
/// back through the same geometry the controller uses.
pub fn sim_params(cfg: &Config) -> PlantParams {
    let geometry = TankGeometry::from(&RuntimeConfig::from(cfg));
    let capacity = geometry.capacity_l().ok().flatten();
    let area = match geometry.base_area_m2() {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, "tank geometry unusable; simulating 0.5 m² base");
            0.5
        }
    };
    PlantParams {
        source_rate_l_min: cfg.simulation.source_rate_l_min,
        tank_rate_l_min: cfg.simulation.tank_rate_l_min,
        drain_rate_l_min: cfg.simulation.drain_rate_l_min,
        tank_level_l: cfg
            .simulation
            .tank_level_l
            .or(capacity)
            .unwrap_or(DEFAULT_SIM_TANK_L),
        tank_capacity_l: capacity,
        tank_area_m2: area,
        pulses_per_l: cfg.flow_sensor.pulses_per_l,
        source_metered: cfg.device.source_flow_sensor,
        pressure_per_m: cfg.pressure.pressure_per_m,
        pressure_offset: cfg.pressure.offset,
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open(cfg: &Config) -> Result<Devices> {
    let clock = clock();
    let plant = irrigation_hardware::SimPlant::with_clock(sim_params(cfg), clock.clone());
    tracing::info!(?plant, "using simulated plant");
    let pressure: Option<Box<dyn PressureSensor + Send>> =
        if cfg.device.pressure_sensor && cfg.has_tank() {
            Some(Box::new(plant.pressure_sensor()))
        } else {
            None
        };
    Ok(Devices {
        valves: Box::new(plant.valves()),
        flow: Box::new(plant.flow_sensor()),
        pressure,
        clock,
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open(cfg: &Config) -> Result<Devices> {
    use eyre::WrapErr;
    use irrigation_hardware::{GpioFlowSensor, GpioValves, ValvePins};

    let pins = &cfg.pins;
    let valves = GpioValves::new(
        ValvePins {
            source: pins.source_valve,
            tank: pins.tank_valve,
            drain: (cfg.has_tank() && cfg.device.drain_valve).then_some(pins.drain_valve),
        },
        pins.active_low,
    )
    .wrap_err("open valve gpio pins")?;
    let flow = GpioFlowSensor::new(pins.flow_sensor).wrap_err("open flow sensor gpio pin")?;
    if cfg.device.pressure_sensor && cfg.has_tank() {
        tracing::warn!("no pressure sensor driver on this build; tank volume will not be reported");
    }
    Ok(Devices {
        valves: Box::new(valves),
        flow: Box::new(flow),
        pressure: None,
        clock: clock(),
    })
}

/// Build the controller for `cfg` on top of the opened valves.
pub fn controller(
    cfg: &Config,
    valves: Box<dyn ValveDriver + Send>,
    clock: Arc<dyn Clock + Send + Sync>,
    sink: impl ReportSink + Send + 'static,
) -> Result<Controller> {
    Controller::builder()
        .with_valves(valves)
        .with_profile(DeviceProfile::from(&cfg.device))
        .with_config(RuntimeConfig::from(cfg))
        .with_clock(Box::new(clock))
        .with_sink(sink)
        .build()
}
