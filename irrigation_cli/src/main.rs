#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Irrigation controller command line.
//!
//! `dispense` and `drain` run one operation and exit; `run` speaks the
//! device's topic protocol as JSON lines over stdin/stdout.

mod cli;
mod dispense;
mod error_fmt;
mod plant;
mod serve;
mod wire;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use irrigation_config::{Config, Logging, Rotation};
use irrigation_core::{DeviceProfile, RuntimeConfig, TankGeometry};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if json_mode() {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Dispense { liters, id } => dispense::run_dispense(&cfg, liters, &id, &shutdown),
        Commands::Drain { max_secs } => dispense::run_drain(&cfg, max_secs, &shutdown),
        Commands::Run => {
            let exit = serve::run_jsonl(&cfg, &shutdown)?;
            tracing::info!(?exit, "message loop ended");
            Ok(())
        }
        Commands::Config => {
            print_config(&RuntimeConfig::from(&cfg));
            Ok(())
        }
        Commands::SelfCheck => self_check(&cfg),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = irrigation_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays free for reports.
fn init_tracing(level: &str, json: bool, logging: &Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level '{level}'"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| "irrigation.log".into(), |n| n.to_os_string());
            let appender = match logging.rotation {
                Rotation::Never => tracing_appender::rolling::never(dir, name),
                Rotation::Daily => tracing_appender::rolling::daily(dir, name),
                Rotation::Hourly => tracing_appender::rolling::hourly(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_level = logging
                .level
                .as_deref()
                .and_then(|l| l.parse::<LevelFilter>().ok())
                .unwrap_or(LevelFilter::INFO);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_level),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn print_config(cfg: &RuntimeConfig) {
    let snapshot = wire::config_snapshot(cfg);
    if json_mode() {
        println!(
            "{}",
            serde_json::json!({ "topic": wire::topics::CONFIG, "payload": snapshot })
        );
        return;
    }
    if let Some(map) = snapshot.as_object() {
        for (k, v) in map {
            println!("{k} = {v}");
        }
    }
}

fn self_check(cfg: &Config) -> Result<()> {
    let profile = DeviceProfile::from(&cfg.device);
    let runtime = RuntimeConfig::from(cfg);
    let mut devices = plant::open(cfg)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut ctl = plant::controller(cfg, devices.valves, devices.clock.clone(), tx)?;

    // Drive everything to a known-safe state.
    ctl.shutdown();

    if profile.has_tank() {
        let geometry = TankGeometry::from(&runtime);
        let area = geometry.base_area_m2()?;
        tracing::info!(area_m2 = area, capacity_l = ?geometry.capacity_l()?, "tank geometry ok");
    }
    if let Some(sensor) = devices.pressure.as_mut() {
        dispense::read_once(&mut ctl, sensor.as_mut());
    }
    drop(ctl);
    let reports: Vec<_> = rx.try_iter().collect();
    tracing::debug!(reports = reports.len(), "self-check reports");

    let tank = reports.iter().find_map(|e| match e {
        irrigation_core::Event::Pressure(p) => p.volume_l,
        _ => None,
    });
    match tank {
        Some(v) => println!(
            "self-check ok: reservoir_mode={:?}, tank {v:.1} L",
            profile.reservoir_mode
        ),
        None => println!("self-check ok: reservoir_mode={:?}", profile.reservoir_mode),
    }
    Ok(())
}
