//! One-shot subcommands: dispense a volume, or drain the tank.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::{Result, bail};
use irrigation_config::Config;
use irrigation_core::runner::{self, RunOptions};
use irrigation_core::sampler::Sampler;
use irrigation_core::{
    Command, Controller, DispenseRequest, DrainState, Event, IrrigationError, Outcome,
    SummaryReport,
};
use irrigation_traits::PressureSensor;

use crate::cli::json_mode;
use crate::plant::{self, Devices};
use crate::wire;

fn human_line(event: &Event) -> Option<String> {
    match event {
        Event::Slice(s) => Some(format!(
            "  {:>7.2} L  {:>6.2} L/min  ({})",
            s.delivered_so_far_l, s.flow_rate_l_min, s.reservoir
        )),
        Event::Summary(s) => Some(format!(
            "dispense '{}' {}: delivered {:.2} of {:.2} L in {:.1} s, {} switch(es)",
            s.request_id,
            s.outcome.as_str(),
            s.total_delivered_l,
            s.target_l,
            s.elapsed_ms as f64 / 1000.0,
            s.switches
        )),
        Event::Drain(d) => Some(match d.tank_volume_l {
            Some(v) => format!("drain {} (tank {v:.1} L)", d.state.as_str()),
            None => format!("drain {}", d.state.as_str()),
        }),
        Event::Status(s) => Some(format!("dispense '{}': {}", s.request_id, s.message)),
        Event::CommandRejected { command, reason } => {
            Some(format!("{command} rejected: {reason}"))
        }
        Event::Pressure(_) | Event::ConfigSnapshot(_) => None,
    }
}

/// Print every event until the controller (the only sender) is dropped.
pub fn spawn_printer(rx: xch::Receiver<Event>, json: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in rx {
            if json {
                println!("{}", wire::encode(&event));
            } else if let Some(line) = human_line(&event) {
                println!("{line}");
            }
        }
    })
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::warn!("report printer thread panicked");
    }
}

pub(crate) fn as_sensor(
    p: &mut Option<Box<dyn PressureSensor + Send>>,
) -> Option<&mut dyn PressureSensor> {
    p.as_deref_mut().map(|s| s as &mut dyn PressureSensor)
}

/// Dispense `liters` and block until the summary.
///
/// An aborted dispensation returns `IrrigationError::Abort` so the exit code
/// names the reason.
pub fn run_dispense(cfg: &Config, liters: f32, id: &str, shutdown: &AtomicBool) -> Result<()> {
    let devices = plant::open(cfg)?;
    let (tx, rx) = xch::unbounded();
    let printer = spawn_printer(rx, json_mode());
    // The controller owns the sender; it is gone once this returns.
    let summary = dispense_until_idle(cfg, devices, tx, liters, id, shutdown);
    join_printer(printer);

    match summary? {
        Some(s) => match s.outcome {
            Outcome::Completed => Ok(()),
            Outcome::Aborted(reason) => Err(IrrigationError::Abort(reason).into()),
        },
        None => bail!("dispensation ended without a summary"),
    }
}

fn dispense_until_idle(
    cfg: &Config,
    mut devices: Devices,
    tx: xch::Sender<Event>,
    liters: f32,
    id: &str,
    shutdown: &AtomicBool,
) -> Result<Option<SummaryReport>> {
    let mut ctl = plant::controller(cfg, devices.valves, devices.clock.clone(), tx)?;
    ctl.handle(Command::Dispense(DispenseRequest::new(liters, id)))?;

    let sampler = Sampler::spawn(
        devices.flow,
        Duration::from_millis(cfg.sampling.interval_ms),
        devices.clock.clone(),
    );
    let (_cmd_tx, cmd_rx) = xch::bounded::<Command>(1);
    let opts = RunOptions {
        pressure_interval: Duration::from_millis(cfg.pressure.read_interval_ms),
        stop_when_idle: true,
        ..RunOptions::default()
    };
    let exit = runner::run(
        &mut ctl,
        &cmd_rx,
        sampler.receiver(),
        as_sensor(&mut devices.pressure),
        opts,
        shutdown,
    );
    tracing::debug!(?exit, "dispense loop finished");
    Ok(ctl.last_summary().cloned())
}

/// Open the drain and poll tank pressure until it auto-closes, the time
/// limit passes, or Ctrl-C.
pub fn run_drain(cfg: &Config, max_secs: u64, shutdown: &AtomicBool) -> Result<()> {
    let devices = plant::open(cfg)?;
    let (tx, rx) = xch::unbounded();
    let printer = spawn_printer(rx, json_mode());
    let res = drain_until_closed(cfg, devices, tx, max_secs, shutdown);
    join_printer(printer);
    res
}

fn drain_until_closed(
    cfg: &Config,
    mut devices: Devices,
    tx: xch::Sender<Event>,
    max_secs: u64,
    shutdown: &AtomicBool,
) -> Result<()> {
    let clock = devices.clock.clone();
    let mut ctl = plant::controller(cfg, devices.valves, clock.clone(), tx)?;
    // Seed the tank reading so the first report carries a volume.
    if let Some(sensor) = devices.pressure.as_mut() {
        read_once(&mut ctl, sensor.as_mut());
    }
    ctl.handle(Command::DrainActivate)?;

    let start = clock.now();
    let limit_ms = max_secs.saturating_mul(1_000);
    let interval = Duration::from_millis(cfg.pressure.read_interval_ms);
    while ctl.drain_state() == DrainState::Open {
        if shutdown.load(Ordering::Relaxed) || clock.ms_since(start) >= limit_ms {
            ctl.handle(Command::DrainDeactivate)?;
            break;
        }
        clock.sleep(interval);
        if let Some(sensor) = devices.pressure.as_mut() {
            read_once(&mut ctl, sensor.as_mut());
        }
    }
    ctl.shutdown();
    Ok(())
}

pub(crate) fn read_once(ctl: &mut Controller, sensor: &mut dyn PressureSensor) {
    match sensor.read(RunOptions::default().sensor_timeout) {
        Ok(p) => {
            if let Err(e) = ctl.on_pressure(p) {
                tracing::warn!(error = %e, "pressure reading not applied");
            }
        }
        Err(e) => tracing::warn!(error = %e, "pressure sensor read failed"),
    }
}
