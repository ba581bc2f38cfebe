//! Cooperative event loop driving a `Controller`.
//!
//! Commands, flow measurements and periodic pressure reads are multiplexed
//! with `crossbeam_channel::select!` and handled one at a time. Commands
//! already queued when a measurement arrives are handled first, so a
//! deactivate wins over a slice report scheduled for the same tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use irrigation_traits::{PressureSensor, ValveDriver};

use crate::command::Command;
use crate::controller::Controller;
use crate::error::IrrigationError;
use crate::estimator::Measurement;
use crate::hw_error::map_hw_error;

/// How often the shutdown flag is polled while nothing else happens.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Tank pressure read period.
    pub pressure_interval: Duration,
    /// Per-read pressure sensor timeout.
    pub sensor_timeout: Duration,
    /// Return as soon as no dispensation is active (one-shot runs).
    pub stop_when_idle: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pressure_interval: Duration::from_secs(1),
            sensor_timeout: Duration::from_millis(200),
            stop_when_idle: false,
        }
    }
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// `stop_when_idle` was set and the dispensation ended.
    Idle,
    /// The command channel closed while idle.
    CommandsClosed,
    /// The shutdown flag was raised.
    Shutdown,
    /// The measurement source went away.
    SamplerStopped,
}

fn handle_logged<V: ValveDriver>(controller: &mut Controller<V>, cmd: Command) {
    // Rejections are already published and logged by the controller.
    let _ = controller.handle(cmd);
}

fn read_pressure<V: ValveDriver>(
    controller: &mut Controller<V>,
    sensor: &mut dyn PressureSensor,
    timeout: Duration,
) {
    match sensor.read(timeout) {
        Ok(p) => {
            if let Err(e) = controller.on_pressure(p) {
                tracing::debug!(error = %e, "pressure reading not applied");
            }
        }
        Err(e) => {
            let mapped: IrrigationError = map_hw_error(&*e);
            tracing::warn!(error = %mapped, "pressure sensor read failed");
        }
    }
}

/// Run until shutdown, a closed input, or (optionally) idle.
///
/// Any active dispensation is aborted and all valves are closed before
/// returning, except on `RunExit::Idle` where nothing is left open by the
/// session.
pub fn run<V: ValveDriver>(
    controller: &mut Controller<V>,
    commands: &xch::Receiver<Command>,
    measurements: &xch::Receiver<Measurement>,
    mut pressure: Option<&mut dyn PressureSensor>,
    opts: RunOptions,
    shutdown: &AtomicBool,
) -> RunExit {
    let ticker = if pressure.is_some() && controller.profile().pressure_supported() {
        xch::tick(opts.pressure_interval)
    } else {
        xch::never()
    };
    let mut commands_open = true;
    let never_cmd = xch::never::<Command>();

    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break RunExit::Shutdown;
        }
        if opts.stop_when_idle && !controller.is_dispensing() {
            break RunExit::Idle;
        }
        if !commands_open && !controller.is_dispensing() {
            break RunExit::CommandsClosed;
        }

        let cmd_rx = if commands_open { commands } else { &never_cmd };
        xch::select! {
            recv(cmd_rx) -> msg => match msg {
                Ok(cmd) => handle_logged(controller, cmd),
                Err(_) => {
                    tracing::debug!("command channel closed");
                    commands_open = false;
                }
            },
            recv(measurements) -> msg => match msg {
                Ok(m) => {
                    if commands_open {
                        for cmd in commands.try_iter() {
                            handle_logged(controller, cmd);
                        }
                    }
                    if let Err(e) = controller.on_measurement(m) {
                        tracing::warn!(error = %e, "measurement rejected");
                    }
                }
                Err(_) => break RunExit::SamplerStopped,
            },
            recv(ticker) -> _ => {
                if let Some(sensor) = pressure.as_deref_mut() {
                    read_pressure(controller, sensor, opts.sensor_timeout);
                }
            },
            default(SHUTDOWN_POLL) => {},
        }
    };

    if exit != RunExit::Idle {
        controller.shutdown();
    }
    tracing::info!(?exit, "runner stopped");
    exit
}
