//! Outbound events and the sink they are published through.

use crossbeam_channel as xch;

use crate::config::{Reservoir, RuntimeConfig};
use crate::drain::DrainState;
use crate::error::AbortReason;
use crate::geometry::PressureReport;

/// How a dispensation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Aborted(AbortReason),
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Aborted(r) => r.as_str(),
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceReport {
    pub request_id: String,
    /// Delivered volume, capped at the target.
    pub delivered_so_far_l: f32,
    pub flow_rate_l_min: f32,
    pub reservoir: Reservoir,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub request_id: String,
    pub target_l: f32,
    pub total_delivered_l: f32,
    pub elapsed_ms: u64,
    pub outcome: Outcome,
    /// Reservoir switches during the session.
    pub switches: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainReport {
    pub state: DrainState,
    /// Present when a pressure sensor has produced a reading.
    pub tank_volume_l: Option<f32>,
    /// The drain closed itself because the tank read empty.
    pub auto_closed: bool,
}

/// Free-text progress note for a dispensation (start, reservoir switch).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub request_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Slice(SliceReport),
    Summary(SummaryReport),
    Drain(DrainReport),
    Pressure(PressureReport),
    Status(StatusReport),
    ConfigSnapshot(RuntimeConfig),
    CommandRejected {
        command: &'static str,
        reason: String,
    },
}

/// Destination for outbound events.
pub trait ReportSink {
    fn emit(&mut self, event: Event);
}

impl ReportSink for xch::Sender<Event> {
    fn emit(&mut self, event: Event) {
        if self.send(event).is_err() {
            tracing::debug!("event receiver disconnected; dropping event");
        }
    }
}

impl ReportSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn emit(&mut self, _event: Event) {}
}
