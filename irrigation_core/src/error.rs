use std::fmt;

use thiserror::Error;

/// Why a dispensation ended without reaching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    UserCancelled,
    SensorFault,
    NoReservoirAvailable,
    ValveFault,
    Shutdown,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::UserCancelled => "user_cancelled",
            AbortReason::SensorFault => "sensor_fault",
            AbortReason::NoReservoirAvailable => "no_reservoir_available",
            AbortReason::ValveFault => "valve_fault",
            AbortReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IrrigationError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("busy: {0}")]
    Busy(&'static str),
    #[error("sensor fault: {0}")]
    SensorFault(String),
    #[error("no reservoir available")]
    NoReservoirAvailable,
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("invalid tank geometry: {0}")]
    InvalidGeometry(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("aborted: {0}")]
    Abort(AbortReason),
}

impl IrrigationError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        IrrigationError::Validation(msg.into())
    }

    /// Abort reason a running session ends with when this error hits it.
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            IrrigationError::SensorFault(_) => AbortReason::SensorFault,
            IrrigationError::NoReservoirAvailable => AbortReason::NoReservoirAvailable,
            IrrigationError::Hardware(_) | IrrigationError::HardwareFault(_) => {
                AbortReason::ValveFault
            }
            IrrigationError::Abort(r) => *r,
            IrrigationError::Validation(_)
            | IrrigationError::Busy(_)
            | IrrigationError::UnsupportedOperation(_)
            | IrrigationError::InvalidGeometry(_) => AbortReason::SensorFault,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing valve driver")]
    MissingValves,
    #[error("missing device profile")]
    MissingProfile,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
