//! Human-readable error descriptions and structured JSON error formatting.

use irrigation_core::{AbortReason, BuildError, IrrigationError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingValves => {
                "What happened: No valve driver was provided to the controller.\nLikely causes: GPIO valves failed to initialize or were not wired into the builder.\nHow to fix: Check the [pins] section and GPIO permissions, then rerun.".to_string()
            }
            BuildError::MissingProfile => {
                "What happened: No device profile was provided to the controller.\nLikely causes: The [device] section was not mapped into the builder.\nHow to fix: Make sure the config file has a [device] section.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/irrigation.toml for a sample."
            ),
        };
    }

    if let Some(ie) = err.downcast_ref::<IrrigationError>() {
        return match ie {
            IrrigationError::Abort(reason) => abort_text(*reason),
            IrrigationError::Validation(msg) => format!(
                "What happened: The request was rejected ({msg}).\nLikely causes: A non-positive volume or an out-of-range setting.\nHow to fix: Correct the value and try again; nothing was actuated."
            ),
            IrrigationError::Busy(what) => format!(
                "What happened: The controller is busy ({what}).\nLikely causes: A dispensation or drain is already running.\nHow to fix: Deactivate the running operation first."
            ),
            IrrigationError::UnsupportedOperation(what) => format!(
                "What happened: This unit cannot do that ({what}).\nLikely causes: The [device] section does not list the required hardware.\nHow to fix: Update reservoir_mode, drain_valve or pressure_sensor if the hardware is present."
            ),
            IrrigationError::InvalidGeometry(msg) => format!(
                "What happened: Tank dimensions are unusable ({msg}).\nLikely causes: A zero radius, length or width in [tank].\nHow to fix: Set tank.dimension_1..3 for the configured shape."
            ),
            IrrigationError::SensorFault(msg) => format!(
                "What happened: A sensor reported an impossible value ({msg}).\nLikely causes: Wiring noise on the flow sensor or a miscalibrated pressure sensor.\nHow to fix: Check wiring and flow_sensor.pulses_per_l / pressure.pressure_per_m."
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this controller.\nDetails: {}\nHow to fix: Compare against etc/irrigation.toml.",
            te.message()
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config <FILE>. Original: {msg}"
        );
    }

    if lower.contains("gpio") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn abort_text(reason: AbortReason) -> String {
    match reason {
        AbortReason::UserCancelled => "What happened: The dispensation was cancelled.\nLikely causes: A deactivate command was received.\nHow to fix: Nothing to fix; start a new dispensation when ready.".to_string(),
        AbortReason::SensorFault => "What happened: The flow sensor reported more than max_flow_rate.\nLikely causes: Electrical noise on the pulse line or pulses_per_l set too low.\nHow to fix: Check the sensor wiring and flow_sensor.pulses_per_l / max_flow_rate.".to_string(),
        AbortReason::NoReservoirAvailable => "What happened: Every available reservoir ran dry.\nLikely causes: Empty tank with no source, or no flow from the metered source.\nHow to fix: Refill the tank or check the supply, then dispense again.".to_string(),
        AbortReason::ValveFault => "What happened: A valve did not respond; all valves were closed.\nLikely causes: Relay or wiring fault on a valve output.\nHow to fix: Inspect the valve wiring and the [pins] section.".to_string(),
        AbortReason::Shutdown => "What happened: The controller shut down during a dispensation.\nLikely causes: Ctrl-C or a lost sensor thread.\nHow to fix: Start a new dispensation.".to_string(),
    }
}

/// Map AbortReason (if present) to stable exit codes; non-abort errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(IrrigationError::Abort(reason)) = err.downcast_ref::<IrrigationError>() {
        return match reason {
            AbortReason::UserCancelled => 3,
            AbortReason::SensorFault => 4,
            AbortReason::NoReservoirAvailable => 5,
            AbortReason::ValveFault => 6,
            AbortReason::Shutdown => 7,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(IrrigationError::Abort(reason)) = err.downcast_ref::<IrrigationError>() {
        return json!({ "reason": reason.as_str(), "message": humanize(err) }).to_string();
    }

    // Generic error JSON
    json!({ "reason": "error", "message": humanize(err) }).to_string()
}
