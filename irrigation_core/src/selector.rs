//! Reservoir selection and exhaustion detection.

use crate::config::{Reservoir, ReservoirMode, RuntimeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Keep,
    SwitchToSource,
    SwitchToTank,
    NoReservoirAvailable,
}

/// Exhaustion thresholds, read from the live config on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_flow_rate: f32,
    pub tank_timeout_ms: u64,
}

impl From<&RuntimeConfig> for Thresholds {
    fn from(c: &RuntimeConfig) -> Self {
        Self {
            min_flow_rate: c.min_flow_rate,
            tank_timeout_ms: c.tank_timeout_ms,
        }
    }
}

/// Reservoir to open when a dispensation starts.
///
/// A tank known to be empty is skipped; `None` means nothing can be opened.
pub fn initial(
    mode: ReservoirMode,
    first: Reservoir,
    tank_known_empty: bool,
) -> Option<Reservoir> {
    match mode {
        ReservoirMode::SourceOnly => Some(Reservoir::Source),
        ReservoirMode::TankOnly if tank_known_empty => None,
        ReservoirMode::TankOnly => Some(Reservoir::Tank),
        ReservoirMode::Both => match first {
            Reservoir::Tank if !tank_known_empty => Some(Reservoir::Tank),
            Reservoir::Tank | Reservoir::Source => Some(Reservoir::Source),
        },
    }
}

/// Decide whether the active reservoir keeps running.
///
/// `elapsed_below_min_ms` is how long the flow has been continuously below
/// `min_flow_rate`, or `None` when it is not.
pub fn select(
    mode: ReservoirMode,
    active: Reservoir,
    flow_rate: f32,
    elapsed_below_min_ms: Option<u64>,
    th: Thresholds,
) -> Selection {
    if flow_rate >= th.min_flow_rate {
        return Selection::Keep;
    }
    match elapsed_below_min_ms {
        Some(ms) if ms >= th.tank_timeout_ms => {}
        _ => return Selection::Keep,
    }
    match (mode, active) {
        (ReservoirMode::Both, Reservoir::Tank) => Selection::SwitchToSource,
        (ReservoirMode::Both, Reservoir::Source)
        | (ReservoirMode::SourceOnly | ReservoirMode::TankOnly, _) => {
            Selection::NoReservoirAvailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TH: Thresholds = Thresholds {
        min_flow_rate: 0.2,
        tank_timeout_ms: 5_000,
    };

    #[rstest]
    #[case(ReservoirMode::SourceOnly, Reservoir::Tank, false, Some(Reservoir::Source))]
    #[case(ReservoirMode::TankOnly, Reservoir::Source, false, Some(Reservoir::Tank))]
    #[case(ReservoirMode::TankOnly, Reservoir::Source, true, None)]
    #[case(ReservoirMode::Both, Reservoir::Source, false, Some(Reservoir::Source))]
    #[case(ReservoirMode::Both, Reservoir::Tank, false, Some(Reservoir::Tank))]
    #[case(ReservoirMode::Both, Reservoir::Tank, true, Some(Reservoir::Source))]
    fn initial_reservoir(
        #[case] mode: ReservoirMode,
        #[case] first: Reservoir,
        #[case] empty: bool,
        #[case] expected: Option<Reservoir>,
    ) {
        assert_eq!(initial(mode, first, empty), expected);
    }

    #[rstest]
    #[case(ReservoirMode::Both, Reservoir::Tank, 1.0, None, Selection::Keep)]
    #[case(ReservoirMode::Both, Reservoir::Tank, 0.0, Some(4_999), Selection::Keep)]
    #[case(ReservoirMode::Both, Reservoir::Tank, 0.0, Some(5_000), Selection::SwitchToSource)]
    #[case(ReservoirMode::Both, Reservoir::Source, 0.1, Some(6_000), Selection::NoReservoirAvailable)]
    #[case(ReservoirMode::TankOnly, Reservoir::Tank, 0.0, Some(5_000), Selection::NoReservoirAvailable)]
    #[case(ReservoirMode::SourceOnly, Reservoir::Source, 0.0, Some(5_000), Selection::NoReservoirAvailable)]
    #[case(ReservoirMode::Both, Reservoir::Tank, 0.0, None, Selection::Keep)]
    fn selection(
        #[case] mode: ReservoirMode,
        #[case] active: Reservoir,
        #[case] rate: f32,
        #[case] below: Option<u64>,
        #[case] expected: Selection,
    ) {
        assert_eq!(select(mode, active, rate, below, TH), expected);
    }
}
