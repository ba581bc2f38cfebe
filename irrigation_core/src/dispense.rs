//! One dispensation, from acceptance to summary.
//!
//! The session tracks delivered volume, slice reporting and the sub-minimum
//! flow mark. Valve actuation goes through the controller's `ValveBank`; the
//! controller owns the session and closes it out when a step reports
//! `Complete` or `Aborted`.

use irrigation_traits::ValveDriver;

use crate::command::DispenseRequest;
use crate::config::{DeviceProfile, Reservoir, RuntimeConfig};
use crate::error::{AbortReason, IrrigationError, Result};
use crate::estimator::{MeasureMode, Measurement, estimate};
use crate::events::{Event, Outcome, ReportSink, SliceReport, StatusReport, SummaryReport};
use crate::selector::{Selection, Thresholds, select};
use crate::status::DispenseStatus;
use crate::valves::ValveBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseState {
    Idle,
    Selecting,
    ActiveSource,
    ActiveTank,
    Completing,
    Aborted(AbortReason),
}

impl DispenseState {
    fn active(r: Reservoir) -> Self {
        match r {
            Reservoir::Source => DispenseState::ActiveSource,
            Reservoir::Tank => DispenseState::ActiveTank,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            DispenseState::Selecting | DispenseState::ActiveSource | DispenseState::ActiveTank
        )
    }
}

#[derive(Debug, Clone)]
pub struct DispenseSession {
    request_id: String,
    target_l: f32,
    state: DispenseState,
    active: Option<Reservoir>,
    delivered_l: f32,
    last_reported_l: f32,
    started_at_ms: u64,
    /// End of the last interval credited; a measurement never reaches back past it.
    last_measured_ms: u64,
    sub_min_since_ms: Option<u64>,
    switches: u32,
    last_flow_rate: f32,
}

impl DispenseSession {
    /// A validated request enters `Selecting`.
    pub fn new(req: DispenseRequest, now_ms: u64) -> Self {
        Self {
            request_id: req.request_id,
            target_l: req.target_volume_l,
            state: DispenseState::Selecting,
            active: None,
            delivered_l: 0.0,
            last_reported_l: 0.0,
            started_at_ms: now_ms,
            last_measured_ms: now_ms,
            sub_min_since_ms: None,
            switches: 0,
            last_flow_rate: 0.0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn target_l(&self) -> f32 {
        self.target_l
    }

    pub fn state(&self) -> DispenseState {
        self.state
    }

    pub fn active_reservoir(&self) -> Option<Reservoir> {
        self.active
    }

    pub fn delivered_l(&self) -> f32 {
        self.delivered_l
    }

    pub fn last_reported_l(&self) -> f32 {
        self.last_reported_l
    }

    pub fn switches(&self) -> u32 {
        self.switches
    }

    pub fn sub_min_since_ms(&self) -> Option<u64> {
        self.sub_min_since_ms
    }

    pub fn last_flow_rate(&self) -> f32 {
        self.last_flow_rate
    }

    /// Open the first reservoir and leave `Selecting`.
    pub(crate) fn start<V: ValveDriver>(
        &mut self,
        reservoir: Reservoir,
        valves: &mut ValveBank<V>,
    ) -> Result<()> {
        valves.open_reservoir(reservoir)?;
        self.active = Some(reservoir);
        self.state = DispenseState::active(reservoir);
        tracing::info!(
            request_id = %self.request_id,
            target_l = self.target_l,
            reservoir = %reservoir,
            "dispensation started"
        );
        Ok(())
    }

    pub(crate) fn mark_aborted(&mut self, reason: AbortReason) {
        self.state = DispenseState::Aborted(reason);
        self.active = None;
    }

    /// Process one measurement interval.
    ///
    /// Slice reporting runs before the completion check so the last slice is
    /// not lost when a measurement crosses the target.
    pub(crate) fn on_measurement<V: ValveDriver>(
        &mut self,
        m: &Measurement,
        now_ms: u64,
        cfg: &RuntimeConfig,
        profile: &DeviceProfile,
        valves: &mut ValveBank<V>,
        sink: &mut dyn ReportSink,
    ) -> Result<DispenseStatus> {
        let Some(active) = self.active else {
            return Ok(DispenseStatus::Running);
        };
        let mode = profile.measure_mode(active);

        // The sampler's interval may have begun before the valve opened.
        let m = if m.interval_ms() == 0 {
            *m
        } else {
            let open_ms = now_ms.saturating_sub(self.last_measured_ms);
            if open_ms == 0 {
                tracing::debug!(?m, "measurement ends before the valve opened; ignored");
                return Ok(DispenseStatus::Running);
            }
            m.clipped(open_ms)
        };

        let est = match estimate(&m, mode, cfg) {
            Ok(e) => e,
            Err(IrrigationError::SensorFault(msg)) => {
                tracing::warn!(request_id = %self.request_id, fault = %msg, "flow sensor fault");
                self.mark_aborted(AbortReason::SensorFault);
                return Ok(DispenseStatus::Aborted(AbortReason::SensorFault));
            }
            Err(e) => return Err(eyre::Report::new(e)),
        };

        self.last_measured_ms = now_ms;
        self.delivered_l += est.volume_delta_l;
        self.last_flow_rate = est.flow_rate_l_min;
        tracing::trace!(
            delta_l = est.volume_delta_l,
            delivered_l = self.delivered_l,
            flow_rate = est.flow_rate_l_min,
            "measurement"
        );

        self.maybe_report_slice(cfg.data_resolution_l, active, sink);

        if self.delivered_l >= self.target_l {
            self.state = DispenseState::Completing;
            if let Err(e) = valves.close_reservoir(active) {
                tracing::warn!(error = %e, "closing supply valve failed at completion");
                self.mark_aborted(AbortReason::ValveFault);
                return Ok(DispenseStatus::Aborted(AbortReason::ValveFault));
            }
            self.active = None;
            return Ok(DispenseStatus::Complete);
        }

        // Static-measured reservoirs report a constant rate and never run dry.
        if mode == MeasureMode::Static {
            return Ok(DispenseStatus::Running);
        }

        let elapsed_below_min = if est.flow_rate_l_min < cfg.min_flow_rate {
            let since = *self
                .sub_min_since_ms
                .get_or_insert(now_ms.saturating_sub(m.interval_ms()));
            Some(now_ms.saturating_sub(since))
        } else {
            self.sub_min_since_ms = None;
            None
        };

        match select(
            profile.reservoir_mode,
            active,
            est.flow_rate_l_min,
            elapsed_below_min,
            Thresholds::from(cfg),
        ) {
            Selection::Keep => Ok(DispenseStatus::Running),
            Selection::SwitchToSource => self.switch_to(Reservoir::Source, valves, sink),
            Selection::SwitchToTank => self.switch_to(Reservoir::Tank, valves, sink),
            Selection::NoReservoirAvailable => {
                tracing::warn!(
                    request_id = %self.request_id,
                    reservoir = %active,
                    delivered_l = self.delivered_l,
                    "reservoir exhausted with no fallback"
                );
                self.mark_aborted(AbortReason::NoReservoirAvailable);
                Ok(DispenseStatus::Aborted(AbortReason::NoReservoirAvailable))
            }
        }
    }

    fn maybe_report_slice(&mut self, resolution: f32, active: Reservoir, sink: &mut dyn ReportSink) {
        let reportable = self.delivered_l.min(self.target_l);
        let unreported = reportable - self.last_reported_l;
        if unreported < resolution {
            return;
        }
        let steps = (unreported / resolution).floor();
        self.last_reported_l += steps * resolution;
        sink.emit(Event::Slice(SliceReport {
            request_id: self.request_id.clone(),
            delivered_so_far_l: reportable,
            flow_rate_l_min: self.last_flow_rate,
            reservoir: active,
        }));
    }

    fn switch_to<V: ValveDriver>(
        &mut self,
        to: Reservoir,
        valves: &mut ValveBank<V>,
        sink: &mut dyn ReportSink,
    ) -> Result<DispenseStatus> {
        let from = self.active;
        if let Err(e) = valves.open_reservoir(to) {
            tracing::warn!(error = %e, to = %to, "reservoir switch failed");
            self.mark_aborted(AbortReason::ValveFault);
            return Ok(DispenseStatus::Aborted(AbortReason::ValveFault));
        }
        self.active = Some(to);
        self.state = DispenseState::active(to);
        self.switches += 1;
        self.sub_min_since_ms = None;
        tracing::info!(
            request_id = %self.request_id,
            from = ?from,
            to = %to,
            delivered_l = self.delivered_l,
            "switched reservoir"
        );
        let from = from.map_or_else(|| "none".to_string(), |r| r.to_string());
        sink.emit(Event::Status(StatusReport {
            request_id: self.request_id.clone(),
            message: format!(
                "{from} exhausted after {:.2} L; switched to {to}",
                self.delivered_l
            ),
        }));
        Ok(DispenseStatus::Running)
    }

    pub(crate) fn summary(&self, outcome: Outcome, now_ms: u64) -> SummaryReport {
        SummaryReport {
            request_id: self.request_id.clone(),
            target_l: self.target_l,
            total_delivered_l: self.delivered_l,
            elapsed_ms: now_ms.saturating_sub(self.started_at_ms),
            outcome,
            switches: self.switches,
        }
    }
}
