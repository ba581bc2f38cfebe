//! Tank drain valve state machine.

use irrigation_traits::ValveDriver;

use crate::config::{DeviceProfile, RuntimeConfig};
use crate::error::{IrrigationError, Result};
use crate::events::{DrainReport, Event, ReportSink};
use crate::geometry::TankReading;
use crate::valves::ValveBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainState {
    #[default]
    Closed,
    Open,
}

impl DrainState {
    pub fn as_str(self) -> &'static str {
        match self {
            DrainState::Closed => "closed",
            DrainState::Open => "open",
        }
    }
}

#[derive(Debug, Default)]
pub struct DrainController {
    state: DrainState,
}

fn report(
    state: DrainState,
    profile: &DeviceProfile,
    tank: Option<&TankReading>,
    auto_closed: bool,
) -> Event {
    let tank_volume_l = if profile.pressure_supported() {
        tank.and_then(|t| t.volume_l)
    } else {
        None
    };
    Event::Drain(DrainReport {
        state,
        tank_volume_l,
        auto_closed,
    })
}

impl DrainController {
    pub fn state(&self) -> DrainState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DrainState::Open
    }

    pub(crate) fn activate<V: ValveDriver>(
        &mut self,
        profile: &DeviceProfile,
        cfg: &RuntimeConfig,
        dispensing: bool,
        valves: &mut ValveBank<V>,
        tank: Option<&TankReading>,
        sink: &mut dyn ReportSink,
    ) -> Result<()> {
        if !profile.has_tank() {
            return Err(eyre::Report::new(IrrigationError::UnsupportedOperation(
                "no tank fitted",
            )));
        }
        if !profile.drain_valve {
            return Err(eyre::Report::new(IrrigationError::UnsupportedOperation(
                "no drain valve fitted",
            )));
        }
        if dispensing && !cfg.allow_drain_while_dispensing {
            return Err(eyre::Report::new(IrrigationError::Busy(
                "dispensation in progress",
            )));
        }
        valves.set_drain(true)?;
        self.state = DrainState::Open;
        tracing::info!(tank_volume_l = ?tank.and_then(|t| t.volume_l), "drain opened");
        sink.emit(report(self.state, profile, tank, false));
        Ok(())
    }

    pub(crate) fn deactivate<V: ValveDriver>(
        &mut self,
        profile: &DeviceProfile,
        valves: &mut ValveBank<V>,
        tank: Option<&TankReading>,
        sink: &mut dyn ReportSink,
    ) -> Result<()> {
        if !profile.drain_supported() {
            return Err(eyre::Report::new(IrrigationError::UnsupportedOperation(
                "no drain valve fitted",
            )));
        }
        valves.set_drain(false)?;
        self.state = DrainState::Closed;
        tracing::info!("drain closed");
        sink.emit(report(self.state, profile, tank, false));
        Ok(())
    }

    /// Close the drain when a reading shows the tank empty.
    pub(crate) fn on_tank_reading<V: ValveDriver>(
        &mut self,
        profile: &DeviceProfile,
        valves: &mut ValveBank<V>,
        reading: &TankReading,
        sink: &mut dyn ReportSink,
    ) -> Result<()> {
        if !self.is_open() || !reading.is_empty() {
            return Ok(());
        }
        valves.set_drain(false)?;
        self.state = DrainState::Closed;
        tracing::info!(height_m = reading.height_m, "tank empty; drain auto-closed");
        sink.emit(report(self.state, profile, Some(reading), true));
        Ok(())
    }

    /// Record a forced close (shutdown) without emitting a report.
    pub(crate) fn force_closed(&mut self) {
        self.state = DrainState::Closed;
    }
}
