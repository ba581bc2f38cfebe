//! Event-driven irrigation controller.
//!
//! Owns the valve bank, the dispense session, the drain state machine and the
//! last tank reading. Every input (command, measurement, pressure reading) is
//! processed to completion before the next one; nothing here is fatal and
//! every failure resolves to idle plus a reported outcome.

use std::sync::Arc;
use std::time::Instant;

use irrigation_traits::{Clock, ValveDriver};

use crate::command::{Command, DispenseRequest};
use crate::config::{ConfigPatch, ConfigStore, DeviceProfile, RuntimeConfig};
use crate::dispense::{DispenseSession, DispenseState};
use crate::drain::{DrainController, DrainState};
use crate::error::{AbortReason, IrrigationError, Result};
use crate::estimator::Measurement;
use crate::events::{Event, Outcome, ReportSink, StatusReport, SummaryReport};
use crate::geometry::{PressureReport, TankReading, translate};
use crate::selector::initial;
use crate::status::DispenseStatus;
use crate::valves::ValveBank;

pub struct Controller<V = Box<dyn ValveDriver + Send>> {
    pub(crate) valves: ValveBank<V>,
    pub(crate) profile: DeviceProfile,
    pub(crate) config: ConfigStore,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) sink: Box<dyn ReportSink + Send>,
    pub(crate) session: Option<DispenseSession>,
    pub(crate) drain: DrainController,
    pub(crate) tank: Option<TankReading>,
    pub(crate) last_summary: Option<SummaryReport>,
}

impl<V> std::fmt::Debug for Controller<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("profile", &self.profile)
            .field("session", &self.session)
            .field("drain", &self.drain)
            .field("tank", &self.tank)
            .finish_non_exhaustive()
    }
}

impl<V: ValveDriver> Controller<V> {
    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn config(&self) -> Arc<RuntimeConfig> {
        self.config.snapshot()
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub fn state(&self) -> DispenseState {
        self.session
            .as_ref()
            .map_or(DispenseState::Idle, DispenseSession::state)
    }

    pub fn session(&self) -> Option<&DispenseSession> {
        self.session.as_ref()
    }

    pub fn is_dispensing(&self) -> bool {
        self.session.is_some()
    }

    pub fn drain_state(&self) -> DrainState {
        self.drain.state()
    }

    pub fn tank(&self) -> Option<&TankReading> {
        self.tank.as_ref()
    }

    pub fn valves(&self) -> &ValveBank<V> {
        &self.valves
    }

    pub fn last_summary(&self) -> Option<&SummaryReport> {
        self.last_summary.as_ref()
    }

    /// Process one inbound command.
    ///
    /// A rejected command leaves all state untouched, publishes
    /// `CommandRejected` and returns the typed error.
    pub fn handle(&mut self, cmd: Command) -> Result<()> {
        let name = cmd.name();
        let res = match cmd {
            Command::Dispense(req) => self.dispense(req),
            Command::Deactivate => {
                self.deactivate();
                Ok(())
            }
            Command::DrainActivate => self.drain_activate(),
            Command::DrainDeactivate => self.drain_deactivate(),
            Command::ConfigChange(patch) => self.apply_config(&patch),
            Command::ConfigRequest => {
                let snap = self.config.snapshot();
                self.sink.emit(Event::ConfigSnapshot((*snap).clone()));
                Ok(())
            }
            Command::ConfigReset => self.reset_config(),
        };
        if let Err(e) = &res {
            tracing::warn!(command = name, error = %e, "command rejected");
            self.sink.emit(Event::CommandRejected {
                command: name,
                reason: e.to_string(),
            });
        }
        res
    }

    fn dispense(&mut self, req: DispenseRequest) -> Result<()> {
        req.validate().map_err(eyre::Report::new)?;
        if self.session.is_some() {
            return Err(eyre::Report::new(IrrigationError::Busy(
                "dispensation already active",
            )));
        }
        let cfg = self.config.snapshot();
        if self.drain.is_open() && !cfg.allow_drain_while_dispensing {
            return Err(eyre::Report::new(IrrigationError::Busy("drain valve is open")));
        }

        let now = self.now_ms();
        let mut session = DispenseSession::new(req, now);
        let tank_known_empty =
            self.profile.pressure_supported() && self.tank.is_some_and(|t| t.is_empty());

        match initial(
            self.profile.reservoir_mode,
            cfg.first_reservoir,
            tank_known_empty,
        ) {
            None => {
                tracing::warn!(
                    request_id = %session.request_id(),
                    "tank known empty and no other reservoir"
                );
                session.mark_aborted(AbortReason::NoReservoirAvailable);
                self.session = Some(session);
                self.finish(Outcome::Aborted(AbortReason::NoReservoirAvailable));
            }
            Some(reservoir) => {
                let started = session.start(reservoir, &mut self.valves);
                let request_id = session.request_id().to_string();
                let target_l = session.target_l();
                self.session = Some(session);
                match started {
                    Ok(()) => self.sink.emit(Event::Status(StatusReport {
                        request_id,
                        message: format!("dispensing {target_l:.2} L from {reservoir}"),
                    })),
                    Err(e) => {
                        tracing::warn!(error = %e, "opening supply valve failed");
                        self.finish(Outcome::Aborted(AbortReason::ValveFault));
                    }
                }
            }
        }
        Ok(())
    }

    /// Cancel the active dispensation, if any.
    pub fn deactivate(&mut self) {
        if self.session.is_some() {
            self.finish(Outcome::Aborted(AbortReason::UserCancelled));
        } else {
            tracing::debug!("deactivate with no active dispensation");
        }
    }

    fn drain_activate(&mut self) -> Result<()> {
        let cfg = self.config.snapshot();
        let dispensing = self.session.is_some();
        self.drain.activate(
            &self.profile,
            &cfg,
            dispensing,
            &mut self.valves,
            self.tank.as_ref(),
            self.sink.as_mut(),
        )
    }

    fn drain_deactivate(&mut self) -> Result<()> {
        self.drain.deactivate(
            &self.profile,
            &mut self.valves,
            self.tank.as_ref(),
            self.sink.as_mut(),
        )
    }

    fn apply_config(&mut self, patch: &ConfigPatch) -> Result<()> {
        let next = self.config.apply(patch).map_err(eyre::Report::new)?;
        tracing::info!(?patch, "config updated");
        self.sink.emit(Event::ConfigSnapshot((*next).clone()));
        Ok(())
    }

    fn reset_config(&mut self) -> Result<()> {
        let next = self.config.reset().map_err(eyre::Report::new)?;
        tracing::info!("config reset to provisioned values");
        self.sink.emit(Event::ConfigSnapshot((*next).clone()));
        Ok(())
    }

    /// Feed one measurement interval to the active session.
    ///
    /// With no active session the measurement is dropped.
    pub fn on_measurement(&mut self, m: Measurement) -> Result<DispenseStatus> {
        let now = self.now_ms();
        let cfg = self.config.snapshot();
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(?m, "no active dispensation; dropping measurement");
            return Ok(DispenseStatus::Idle);
        };

        let status = session.on_measurement(
            &m,
            now,
            &cfg,
            &self.profile,
            &mut self.valves,
            self.sink.as_mut(),
        )?;

        match status {
            DispenseStatus::Complete => self.finish(Outcome::Completed),
            DispenseStatus::Aborted(reason) => self.finish(Outcome::Aborted(reason)),
            DispenseStatus::Idle | DispenseStatus::Running => {}
        }
        Ok(status)
    }

    /// Translate a tank pressure reading and publish it.
    ///
    /// An out-of-range reading aborts a dispensation drawing from the tank.
    pub fn on_pressure(&mut self, pressure: f32) -> Result<TankReading> {
        if !self.profile.pressure_supported() {
            return Err(eyre::Report::new(IrrigationError::UnsupportedOperation(
                "no tank pressure sensor fitted",
            )));
        }
        let cfg = self.config.snapshot();
        let reading = match translate(pressure, &cfg) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(pressure, error = %e, "tank pressure reading rejected");
                if matches!(e, IrrigationError::SensorFault(_))
                    && self
                        .session
                        .as_ref()
                        .is_some_and(|s| s.state() == DispenseState::ActiveTank)
                {
                    self.finish(Outcome::Aborted(AbortReason::SensorFault));
                }
                return Err(eyre::Report::new(e));
            }
        };

        self.tank = Some(reading);
        tracing::trace!(pressure, height_m = reading.height_m, volume_l = ?reading.volume_l, "tank reading");
        self.sink.emit(Event::Pressure(PressureReport::new(
            &reading,
            cfg.pressure_report_mode,
        )));
        self.drain
            .on_tank_reading(&self.profile, &mut self.valves, &reading, self.sink.as_mut())?;
        Ok(reading)
    }

    /// Abort any dispensation and close every valve, best-effort.
    pub fn shutdown(&mut self) {
        if self.session.is_some() {
            self.finish(Outcome::Aborted(AbortReason::Shutdown));
        }
        if let Err(e) = self.valves.close_all() {
            tracing::warn!(error = %e, "closing valves failed on shutdown");
        }
        self.drain.force_closed();
    }

    /// Close the supplies, publish the summary and return to idle.
    fn finish(&mut self, outcome: Outcome) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Outcome::Aborted(reason) = outcome {
            session.mark_aborted(reason);
            if let Err(e) = self.valves.close_supplies() {
                tracing::warn!(error = %e, "closing supply valves failed on abort");
            }
        }
        let summary = session.summary(outcome, self.now_ms());
        match outcome {
            Outcome::Completed => tracing::info!(
                request_id = %summary.request_id,
                delivered_l = summary.total_delivered_l,
                elapsed_ms = summary.elapsed_ms,
                switches = summary.switches,
                "dispensation complete"
            ),
            Outcome::Aborted(reason) => tracing::warn!(
                request_id = %summary.request_id,
                reason = %reason,
                delivered_l = summary.total_delivered_l,
                "dispensation aborted"
            ),
        }
        self.sink.emit(Event::Summary(summary.clone()));
        self.last_summary = Some(summary);
    }
}
