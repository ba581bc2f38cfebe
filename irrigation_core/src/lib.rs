#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Dispensation and reservoir-switching engine (hardware-agnostic).
//!
//! All hardware interaction goes through the `irrigation_traits` seams:
//! `ValveDriver` for actuation, `FlowSensor` for pulses, `PressureSensor` for
//! the tank.
//!
//! ## Architecture
//!
//! - **Estimator**: pulses or elapsed time to volume and flow rate (`estimator`)
//! - **Geometry**: tank pressure to height to volume (`geometry`)
//! - **Selector**: initial reservoir and exhaustion decisions (`selector`)
//! - **Dispense**: per-request state machine and slice reporting (`dispense`)
//! - **Drain**: drain valve state machine (`drain`)
//! - **Controller**: owns valves and state, consumes commands and readings (`controller`)
//! - **Runner/Sampler**: threaded pulse sampling and the event loop (`runner`, `sampler`)
//! - **Configuration**: runtime tunables behind a swap-on-write store (`config`)

pub mod builder;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dispense;
pub mod drain;
pub mod error;
pub mod estimator;
pub mod events;
pub mod geometry;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod sampler;
pub mod selector;
pub mod status;
pub mod util;
pub mod valves;

pub use builder::{ControllerBuilder, build_controller};
pub use command::{Command, DispenseRequest};
pub use config::{
    ConfigPatch, ConfigStore, DeviceProfile, PressureReportMode, Reservoir, ReservoirMode,
    RuntimeConfig, TankShape,
};
pub use controller::Controller;
pub use dispense::{DispenseSession, DispenseState};
pub use drain::DrainState;
pub use error::{AbortReason, BuildError, IrrigationError, Result};
pub use estimator::{Estimate, MeasureMode, Measurement};
pub use events::{
    DrainReport, Event, NullSink, Outcome, ReportSink, SliceReport, StatusReport, SummaryReport,
};
pub use geometry::{PressureReport, TankGeometry, TankReading};
pub use status::DispenseStatus;
