//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "irrigation", version, about = "Irrigation valve controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/irrigation.toml")]
    pub config: PathBuf,

    /// Print reports and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispense a volume and wait for the summary
    Dispense {
        /// Target volume in liters
        #[arg(long, value_name = "L")]
        liters: f32,
        /// Request id echoed in every report
        #[arg(long, value_name = "ID", default_value = "cli")]
        id: String,
    },
    /// Open the tank drain until it reads empty or the time limit passes
    Drain {
        /// Close the drain after this many seconds even if the tank is not empty
        #[arg(long, value_name = "SECS", default_value_t = 600)]
        max_secs: u64,
    },
    /// Read JSON command messages from stdin and write reports to stdout
    #[command(
        long_about = "Read one JSON message per line from stdin, shaped as {\"topic\": ..., \"payload\": {...}}.\n\nInbound topics: dispense/activate, deactivate, drain/activate, config/change, config/get, config/settings_reset.\nOutbound topics: dispense/report/slice, dispense/report/summary, drain/report, pressure/read, config, log/info, log/error.\n\nRuns until stdin closes and no dispensation is active, or until Ctrl-C."
    )]
    Run,
    /// Print the validated runtime configuration
    Config,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
