//! JSON line boundary for `run`: one `{"topic", "payload"}` object per line.
//!
//! Inbound payloads are decoded into the closed `Command` set here, so the
//! controller never sees raw JSON. Outbound events keep the device's topic
//! names. Outbound topics are never accepted inbound: a snapshot on `config`
//! echoed back must not trigger another snapshot, so requests use
//! `config/get`.

use eyre::{Result, WrapErr, bail};
use irrigation_config::ConfigChange;
use irrigation_core::{
    Command, ConfigPatch, DispenseRequest, DrainReport, Event, PressureReport, RuntimeConfig,
    SliceReport, SummaryReport,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub mod topics {
    pub const DISPENSE_ACTIVATE: &str = "dispense/activate";
    pub const DISPENSE_SLICE: &str = "dispense/report/slice";
    pub const DISPENSE_SUMMARY: &str = "dispense/report/summary";
    pub const DEACTIVATE: &str = "deactivate";
    pub const DRAIN_ACTIVATE: &str = "drain/activate";
    pub const DRAIN_REPORT: &str = "drain/report";
    pub const CONFIG: &str = "config";
    pub const CONFIG_GET: &str = "config/get";
    pub const CONFIG_CHANGE: &str = "config/change";
    pub const SETTINGS_RESET: &str = "config/settings_reset";
    pub const PRESSURE_READ: &str = "pressure/read";
    pub const LOG_INFO: &str = "log/info";
    pub const LOG_ERROR: &str = "log/error";

    /// Published by the controller only.
    pub const OUTBOUND: &[&str] = &[
        DISPENSE_SLICE,
        DISPENSE_SUMMARY,
        DRAIN_REPORT,
        CONFIG,
        PRESSURE_READ,
        LOG_INFO,
        LOG_ERROR,
    ];
}

#[derive(Debug, Deserialize)]
struct Inbound {
    topic: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct DispensePayload {
    #[serde(alias = "volume", alias = "liters")]
    volume_l: f32,
    #[serde(default, alias = "request_id")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Switch {
    Flag(bool),
    Word(String),
}

#[derive(Debug, Deserialize)]
struct DrainPayload {
    #[serde(default, alias = "open")]
    state: Option<Switch>,
}

fn drain_open(payload: Value) -> Result<bool> {
    if payload.is_null() {
        return Ok(true);
    }
    let p: DrainPayload =
        serde_json::from_value(payload).wrap_err("invalid drain/activate payload")?;
    match p.state {
        None | Some(Switch::Flag(true)) => Ok(true),
        Some(Switch::Flag(false)) => Ok(false),
        Some(Switch::Word(w)) => match w.to_ascii_lowercase().as_str() {
            "open" | "on" | "activate" => Ok(true),
            "close" | "closed" | "off" | "deactivate" => Ok(false),
            other => bail!("unknown drain state '{other}'"),
        },
    }
}

/// Decode one inbound line into a controller command.
pub fn decode(line: &str) -> Result<Command> {
    let msg: Inbound = serde_json::from_str(line).wrap_err("malformed message")?;
    let cmd = match msg.topic.as_str() {
        topics::DISPENSE_ACTIVATE => {
            let p: DispensePayload = serde_json::from_value(msg.payload)
                .wrap_err("invalid dispense/activate payload")?;
            Command::Dispense(DispenseRequest::new(
                p.volume_l,
                p.id.unwrap_or_default(),
            ))
        }
        topics::DEACTIVATE => Command::Deactivate,
        topics::DRAIN_ACTIVATE => {
            if drain_open(msg.payload)? {
                Command::DrainActivate
            } else {
                Command::DrainDeactivate
            }
        }
        topics::CONFIG_CHANGE => {
            let change: ConfigChange = serde_json::from_value(msg.payload)
                .wrap_err("invalid config/change payload")?;
            if change.is_empty() {
                bail!("config/change carried no known fields");
            }
            Command::ConfigChange(ConfigPatch::from(&change))
        }
        topics::CONFIG_GET => Command::ConfigRequest,
        topics::SETTINGS_RESET => Command::ConfigReset,
        other if topics::OUTBOUND.contains(&other) => {
            bail!("'{other}' is an outbound topic; ignored")
        }
        other => bail!("unknown topic '{other}'"),
    };
    Ok(cmd)
}

/// f32 in its shortest decimal form (0.2, not 0.20000000298023224).
fn num(v: f32) -> Value {
    v.to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn message(topic: &str, payload: Value) -> Value {
    json!({ "topic": topic, "payload": payload })
}

fn slice(s: &SliceReport) -> Value {
    json!({
        "id": s.request_id,
        "delivered_l": num(s.delivered_so_far_l),
        "flow_rate": num(s.flow_rate_l_min),
        "reservoir": s.reservoir.as_str(),
    })
}

fn summary(s: &SummaryReport) -> Value {
    json!({
        "id": s.request_id,
        "target_l": num(s.target_l),
        "delivered_l": num(s.total_delivered_l),
        "elapsed_ms": s.elapsed_ms,
        "outcome": s.outcome.as_str(),
        "switches": s.switches,
    })
}

fn drain(d: &DrainReport) -> Value {
    let mut obj = Map::new();
    obj.insert("state".into(), json!(d.state.as_str()));
    if let Some(v) = d.tank_volume_l {
        obj.insert("tank_volume_l".into(), num(v));
    }
    obj.insert("auto_closed".into(), json!(d.auto_closed));
    Value::Object(obj)
}

fn pressure(p: &PressureReport) -> Value {
    let mut obj = Map::new();
    if let Some(v) = p.pressure {
        obj.insert("pressure".into(), num(v));
    }
    if let Some(v) = p.volume_l {
        obj.insert("volume_l".into(), num(v));
    }
    Value::Object(obj)
}

/// Snapshot keys match the `config/change` field names.
pub fn config_snapshot(c: &RuntimeConfig) -> Value {
    json!({
        "data_resolution_l": num(c.data_resolution_l),
        "static_flow_rate": num(c.static_flow_rate),
        "pulses_per_l": num(c.pulses_per_l),
        "max_flow_rate": num(c.max_flow_rate),
        "min_flow_rate": num(c.min_flow_rate),
        "tank_timeout_ms": c.tank_timeout_ms,
        "tank_shape": c.tank_shape.as_str(),
        "dimension_1": num(c.dimension_1),
        "dimension_2": num(c.dimension_2),
        "dimension_3": num(c.dimension_3),
        "pressure_report_mode": c.pressure_report_mode.as_str(),
        "pressure_per_m": num(c.pressure_per_m),
        "pressure_offset": num(c.pressure_offset),
        "first_reservoir": c.first_reservoir.as_str(),
        "allow_drain_while_dispensing": c.allow_drain_while_dispensing,
    })
}

pub fn encode(event: &Event) -> Value {
    match event {
        Event::Slice(s) => message(topics::DISPENSE_SLICE, slice(s)),
        Event::Summary(s) => message(topics::DISPENSE_SUMMARY, summary(s)),
        Event::Drain(d) => message(topics::DRAIN_REPORT, drain(d)),
        Event::Pressure(p) => message(topics::PRESSURE_READ, pressure(p)),
        Event::Status(s) => message(
            topics::LOG_INFO,
            json!({ "id": s.request_id, "message": s.message }),
        ),
        Event::ConfigSnapshot(c) => message(topics::CONFIG, config_snapshot(c)),
        Event::CommandRejected { command, reason } => message(
            topics::LOG_ERROR,
            json!({ "command": command, "reason": reason }),
        ),
    }
}

/// `log/error` line for input that never became a command.
pub fn decode_error(err: &eyre::Report) -> Value {
    message(topics::LOG_ERROR, json!({ "reason": format!("{err:#}") }))
}
