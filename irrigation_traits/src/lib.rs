//! Hardware seams for the irrigation controller.
//!
//! The core never touches pins or buses directly: valves are actuated through
//! [`ValveDriver`], pulses are pulled from a [`FlowSensor`], and tank pressure is
//! read from a [`PressureSensor`]. Errors crossing these seams are boxed so each
//! backend can keep its own error type.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::fmt;

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The three valves a controller can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValveId {
    /// Supply valve on the pressurized, inexhaustible source.
    Source,
    /// Supply valve on the exhaustible tank.
    Tank,
    /// Drain valve on the tank.
    Drain,
}

impl ValveId {
    pub const ALL: [ValveId; 3] = [ValveId::Source, ValveId::Tank, ValveId::Drain];

    pub fn as_str(self) -> &'static str {
        match self {
            ValveId::Source => "source",
            ValveId::Tank => "tank",
            ValveId::Drain => "drain",
        }
    }
}

impl fmt::Display for ValveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait ValveDriver {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), BoxError>;
}

impl<T: ValveDriver + ?Sized> ValveDriver for Box<T> {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), BoxError> {
        (**self).set_valve(valve, open)
    }
}

pub trait FlowSensor {
    /// Return the pulses counted since the previous call and reset the counter.
    fn take_pulses(&mut self) -> Result<u32, BoxError>;
}

impl<T: FlowSensor + ?Sized> FlowSensor for Box<T> {
    fn take_pulses(&mut self) -> Result<u32, BoxError> {
        (**self).take_pulses()
    }
}

pub trait PressureSensor {
    fn read(&mut self, timeout: std::time::Duration) -> Result<f32, BoxError>;
}

impl<T: PressureSensor + ?Sized> PressureSensor for Box<T> {
    fn read(&mut self, timeout: std::time::Duration) -> Result<f32, BoxError> {
        (**self).read(timeout)
    }
}
