//! Hardware backends for the irrigation controller.
//!
//! The simulated plant is always available; the `hardware` feature adds
//! Raspberry Pi GPIO valves and an interrupt-driven pulse counter.
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{PlantParams, SimFlowSensor, SimPlant, SimPressureSensor, SimValves};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioFlowSensor, GpioValves, ValvePins};
