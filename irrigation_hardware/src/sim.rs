//! Simulated plant: two supply valves, a drain and a tank.
//!
//! `SimValves`, `SimFlowSensor` and `SimPressureSensor` share one plant state.
//! Flow is integrated lazily from the shared clock whenever any handle is
//! touched, so the simulation runs at whatever pace the clock moves.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use irrigation_traits::{BoxError, Clock, FlowSensor, MonotonicClock, PressureSensor, ValveDriver, ValveId};

use crate::error::HwError;

const LITERS_PER_M3: f64 = 1_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlantParams {
    /// L/min through the open source valve.
    pub source_rate_l_min: f32,
    /// L/min through the open tank valve while the tank holds water.
    pub tank_rate_l_min: f32,
    /// L/min out of the open drain.
    pub drain_rate_l_min: f32,
    pub tank_level_l: f32,
    /// Level clamp; `None` for an unbounded tank.
    pub tank_capacity_l: Option<f32>,
    /// Horizontal cross-section of the tank in m².
    pub tank_area_m2: f32,
    pub pulses_per_l: f32,
    /// Source flow passes the pulse sensor.
    pub source_metered: bool,
    pub pressure_per_m: f32,
    pub pressure_offset: f32,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            source_rate_l_min: 12.45,
            tank_rate_l_min: 8.0,
            drain_rate_l_min: 20.0,
            tank_level_l: 100.0,
            tank_capacity_l: None,
            tank_area_m2: 0.5,
            pulses_per_l: 1265.289,
            source_metered: false,
            pressure_per_m: 9_806.65,
            pressure_offset: 0.0,
        }
    }
}

#[derive(Debug)]
struct PlantState {
    source_open: bool,
    tank_open: bool,
    drain_open: bool,
    tank_l: f64,
    pending_pulses: f64,
    delivered_l: f64,
    last: Instant,
    failing: Option<ValveId>,
}

/// Handle on the shared simulated plant.
#[derive(Clone)]
pub struct SimPlant {
    state: Arc<Mutex<PlantState>>,
    params: Arc<PlantParams>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for SimPlant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimPlant")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl SimPlant {
    pub fn new(params: PlantParams) -> Self {
        Self::with_clock(params, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(params: PlantParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let state = PlantState {
            source_open: false,
            tank_open: false,
            drain_open: false,
            tank_l: f64::from(params.tank_level_l.max(0.0)),
            pending_pulses: 0.0,
            delivered_l: 0.0,
            last: clock.now(),
            failing: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            params: Arc::new(params),
            clock,
        }
    }

    pub fn valves(&self) -> SimValves {
        SimValves { plant: self.clone() }
    }

    pub fn flow_sensor(&self) -> SimFlowSensor {
        SimFlowSensor { plant: self.clone() }
    }

    pub fn pressure_sensor(&self) -> SimPressureSensor {
        SimPressureSensor { plant: self.clone() }
    }

    /// Integrate flows up to now and return the locked state.
    fn advance(&self) -> MutexGuard<'_, PlantState> {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let dt_min = now.saturating_duration_since(s.last).as_secs_f64() / 60.0;
        s.last = now;
        if dt_min <= 0.0 {
            return s;
        }
        let p = &self.params;
        let ppl = f64::from(p.pulses_per_l);

        if s.tank_open {
            let out = (f64::from(p.tank_rate_l_min) * dt_min).min(s.tank_l);
            s.tank_l -= out;
            s.delivered_l += out;
            s.pending_pulses += out * ppl;
        }
        if s.source_open {
            let out = f64::from(p.source_rate_l_min) * dt_min;
            s.delivered_l += out;
            if p.source_metered {
                s.pending_pulses += out * ppl;
            }
        }
        if s.drain_open {
            let out = (f64::from(p.drain_rate_l_min) * dt_min).min(s.tank_l);
            s.tank_l -= out;
        }
        if let Some(cap) = p.tank_capacity_l {
            s.tank_l = s.tank_l.min(f64::from(cap));
        }
        s
    }

    pub fn tank_level_l(&self) -> f32 {
        self.advance().tank_l as f32
    }

    /// Total volume that left through the supply valves.
    pub fn delivered_l(&self) -> f32 {
        self.advance().delivered_l as f32
    }

    pub fn is_open(&self, valve: ValveId) -> bool {
        let s = self.advance();
        match valve {
            ValveId::Source => s.source_open,
            ValveId::Tank => s.tank_open,
            ValveId::Drain => s.drain_open,
        }
    }

    /// Make commands on `valve` fail until cleared with `None`.
    pub fn set_failing(&self, valve: Option<ValveId>) {
        self.advance().failing = valve;
    }

    pub fn set_tank_level(&self, liters: f32) {
        let cap = self.params.tank_capacity_l.map_or(f64::INFINITY, f64::from);
        self.advance().tank_l = f64::from(liters.max(0.0)).min(cap);
    }
}

/// Valve driver acting on the simulated plant.
#[derive(Debug, Clone)]
pub struct SimValves {
    plant: SimPlant,
}

impl ValveDriver for SimValves {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), BoxError> {
        let mut s = self.plant.advance();
        if s.failing == Some(valve) {
            return Err(Box::new(HwError::Gpio(format!("{valve} relay stuck"))));
        }
        match valve {
            ValveId::Source => s.source_open = open,
            ValveId::Tank => s.tank_open = open,
            ValveId::Drain => s.drain_open = open,
        }
        tracing::debug!(valve = %valve, open, tank_l = s.tank_l, "sim valve");
        Ok(())
    }
}

/// Pulse counter on the supply line.
#[derive(Debug, Clone)]
pub struct SimFlowSensor {
    plant: SimPlant,
}

impl FlowSensor for SimFlowSensor {
    fn take_pulses(&mut self) -> Result<u32, BoxError> {
        let mut s = self.plant.advance();
        let whole = s.pending_pulses.floor();
        s.pending_pulses -= whole;
        // saturating float-to-int conversion
        Ok(whole as u32)
    }
}

/// Hydrostatic pressure at the bottom of the tank.
#[derive(Debug, Clone)]
pub struct SimPressureSensor {
    plant: SimPlant,
}

impl PressureSensor for SimPressureSensor {
    fn read(&mut self, _timeout: Duration) -> Result<f32, BoxError> {
        let p = &self.plant.params;
        if p.tank_area_m2 <= 0.0 {
            return Err(Box::new(HwError::OutOfRange(
                "tank area must be > 0".into(),
            )));
        }
        let tank_l = self.plant.advance().tank_l;
        let height_m = tank_l / LITERS_PER_M3 / f64::from(p.tank_area_m2);
        Ok((f64::from(p.pressure_offset) + height_m * f64::from(p.pressure_per_m)) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_traits::ManualClock;

    fn plant(params: PlantParams) -> (SimPlant, ManualClock) {
        let clock = ManualClock::new();
        (SimPlant::with_clock(params, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn tank_flow_produces_pulses_and_depletes() {
        let (p, clock) = plant(PlantParams {
            tank_rate_l_min: 2.0,
            tank_level_l: 10.0,
            pulses_per_l: 100.0,
            ..PlantParams::default()
        });
        p.valves().set_valve(ValveId::Tank, true).unwrap();
        clock.advance(Duration::from_secs(30));
        // 2 L/min for 30 s = 1 L = 100 pulses
        assert_eq!(p.flow_sensor().take_pulses().unwrap(), 100);
        assert!((p.tank_level_l() - 9.0).abs() < 1e-4);
    }

    #[test]
    fn empty_tank_stops_pulsing() {
        let (p, clock) = plant(PlantParams {
            tank_rate_l_min: 60.0,
            tank_level_l: 0.5,
            pulses_per_l: 10.0,
            ..PlantParams::default()
        });
        p.valves().set_valve(ValveId::Tank, true).unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(p.flow_sensor().take_pulses().unwrap(), 5);
        clock.advance(Duration::from_secs(60));
        assert_eq!(p.flow_sensor().take_pulses().unwrap(), 0);
    }

    #[test]
    fn unmetered_source_does_not_pulse() {
        let (p, clock) = plant(PlantParams::default());
        p.valves().set_valve(ValveId::Source, true).unwrap();
        clock.advance(Duration::from_secs(30));
        assert_eq!(p.flow_sensor().take_pulses().unwrap(), 0);
        assert!(p.delivered_l() > 6.0);
    }

    #[test]
    fn pressure_tracks_level() {
        let (p, _clock) = plant(PlantParams {
            tank_level_l: 500.0,
            tank_area_m2: 1.0,
            pressure_per_m: 10_000.0,
            pressure_offset: 50.0,
            ..PlantParams::default()
        });
        let reading = p.pressure_sensor().read(Duration::from_millis(10)).unwrap();
        assert!((reading - 5_050.0).abs() < 1e-2);
    }

    #[test]
    fn failing_valve_returns_hw_error() {
        let (p, _clock) = plant(PlantParams::default());
        p.set_failing(Some(ValveId::Tank));
        let err = p.valves().set_valve(ValveId::Tank, true).unwrap_err();
        assert!(err.downcast_ref::<HwError>().is_some());
    }
}
