//! Dispense status returned for each processed measurement.

use crate::error::AbortReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseStatus {
    /// No dispensation is active; the measurement was dropped.
    Idle,
    /// Keep going; target not reached.
    Running,
    /// Target reached; supply valve already closed.
    Complete,
    /// Ended early; supply valves have been asked to close.
    Aborted(AbortReason),
}

impl DispenseStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, DispenseStatus::Complete | DispenseStatus::Aborted(_))
    }
}
