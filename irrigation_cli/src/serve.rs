//! `run`: JSON command lines on stdin, report lines on stdout.

use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::Result;
use irrigation_config::Config;
use irrigation_core::Command;
use irrigation_core::runner::{self, RunExit, RunOptions};
use irrigation_core::sampler::Sampler;

use crate::dispense::{as_sensor, spawn_printer};
use crate::plant;
use crate::wire;

/// Decode stdin lines into commands until EOF or the runner goes away.
/// Undecodable lines are answered on `log/error` right away.
fn spawn_reader(tx: xch::Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match wire::decode(&line) {
                Ok(cmd) => {
                    tracing::debug!(command = cmd.name(), "command received");
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable message");
                    println!("{}", wire::decode_error(&e));
                }
            }
        }
        tracing::debug!("stdin closed");
    });
}

pub fn run_jsonl(cfg: &Config, shutdown: &AtomicBool) -> Result<RunExit> {
    let mut devices = plant::open(cfg)?;
    let (tx, rx) = xch::unbounded();
    let printer = spawn_printer(rx, true);

    let exit = {
        let mut ctl = plant::controller(cfg, devices.valves, devices.clock.clone(), tx)?;
        // Publish the active configuration on start, as the device does on connect.
        ctl.handle(Command::ConfigRequest)?;

        let (cmd_tx, cmd_rx) = xch::unbounded();
        // Not joined: it may be parked on a stdin that never closes.
        spawn_reader(cmd_tx);

        let sampler = Sampler::spawn(
            devices.flow,
            Duration::from_millis(cfg.sampling.interval_ms),
            devices.clock.clone(),
        );
        let opts = RunOptions {
            pressure_interval: Duration::from_millis(cfg.pressure.read_interval_ms),
            ..RunOptions::default()
        };
        runner::run(
            &mut ctl,
            &cmd_rx,
            sampler.receiver(),
            as_sensor(&mut devices.pressure),
            opts,
            shutdown,
        )
    };
    if printer.join().is_err() {
        tracing::warn!("report printer thread panicked");
    }
    Ok(exit)
}
