//! Volume estimation from raw measurement events.
//!
//! A reservoir is measured either by counting flow-sensor pulses or by timing
//! a known static flow rate. The estimator is pure; callers accumulate.

use crate::config::RuntimeConfig;
use crate::error::IrrigationError;
use crate::util::{ms_to_minutes, volume_at_rate};

/// One measurement interval delivered to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// Pulses counted by the flow sensor over `interval_ms`.
    Pulses { count: u32, interval_ms: u64 },
    /// Time elapsed without pulse information.
    Elapsed { interval_ms: u64 },
}

impl Measurement {
    pub fn interval_ms(&self) -> u64 {
        match *self {
            Measurement::Pulses { interval_ms, .. } | Measurement::Elapsed { interval_ms } => {
                interval_ms
            }
        }
    }

    /// The same measurement with its interval cut to at most `max_ms`.
    pub fn clipped(self, max_ms: u64) -> Self {
        match self {
            Measurement::Pulses { count, interval_ms } => Measurement::Pulses {
                count,
                interval_ms: interval_ms.min(max_ms),
            },
            Measurement::Elapsed { interval_ms } => Measurement::Elapsed {
                interval_ms: interval_ms.min(max_ms),
            },
        }
    }

    /// Pulse count; an elapsed-only interval counts as zero pulses.
    pub fn pulses(&self) -> u32 {
        match *self {
            Measurement::Pulses { count, .. } => count,
            Measurement::Elapsed { .. } => 0,
        }
    }
}

/// How the active reservoir's volume is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureMode {
    Pulses,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub volume_delta_l: f32,
    pub flow_rate_l_min: f32,
}

/// Convert a measurement into `(volume_delta_l, flow_rate_l_min)`.
///
/// In pulse mode a computed flow rate above `max_flow_rate` is reported as a
/// sensor fault rather than clamped.
pub fn estimate(
    m: &Measurement,
    mode: MeasureMode,
    cfg: &RuntimeConfig,
) -> Result<Estimate, IrrigationError> {
    let interval_ms = m.interval_ms();
    if interval_ms == 0 {
        return Err(IrrigationError::validation(
            "measurement interval must be > 0 ms",
        ));
    }
    let minutes = ms_to_minutes(interval_ms);

    match mode {
        MeasureMode::Pulses => {
            let volume_delta_l = m.pulses() as f32 / cfg.pulses_per_l;
            let flow_rate_l_min = volume_delta_l / minutes;
            if flow_rate_l_min > cfg.max_flow_rate {
                return Err(IrrigationError::SensorFault(format!(
                    "flow rate {flow_rate_l_min:.2} L/min exceeds max {:.2} L/min",
                    cfg.max_flow_rate
                )));
            }
            Ok(Estimate {
                volume_delta_l,
                flow_rate_l_min,
            })
        }
        MeasureMode::Static => Ok(Estimate {
            volume_delta_l: volume_at_rate(cfg.static_flow_rate, interval_ms),
            flow_rate_l_min: cfg.static_flow_rate,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cfg() -> RuntimeConfig {
        RuntimeConfig {
            pulses_per_l: 100.0,
            static_flow_rate: 12.0,
            max_flow_rate: 30.0,
            ..RuntimeConfig::default()
        }
    }

    #[rstest]
    #[case(50, 6_000, 0.5, 5.0)]
    #[case(0, 1_000, 0.0, 0.0)]
    #[case(100, 60_000, 1.0, 1.0)]
    fn pulse_mode(
        #[case] count: u32,
        #[case] interval_ms: u64,
        #[case] volume: f32,
        #[case] rate: f32,
    ) {
        let e = estimate(
            &Measurement::Pulses { count, interval_ms },
            MeasureMode::Pulses,
            &cfg(),
        )
        .unwrap();
        assert!((e.volume_delta_l - volume).abs() < 1e-5);
        assert!((e.flow_rate_l_min - rate).abs() < 1e-4);
    }

    #[test]
    fn static_mode_ignores_pulses() {
        let e = estimate(
            &Measurement::Pulses {
                count: 9_999,
                interval_ms: 5_000,
            },
            MeasureMode::Static,
            &cfg(),
        )
        .unwrap();
        assert!((e.volume_delta_l - 1.0).abs() < 1e-5);
        assert_eq!(e.flow_rate_l_min, 12.0);
    }

    #[test]
    fn elapsed_counts_as_zero_pulses() {
        let e = estimate(
            &Measurement::Elapsed { interval_ms: 500 },
            MeasureMode::Pulses,
            &cfg(),
        )
        .unwrap();
        assert_eq!(e.volume_delta_l, 0.0);
        assert_eq!(e.flow_rate_l_min, 0.0);
    }

    #[test]
    fn rate_above_max_is_a_sensor_fault() {
        // 100 pulses in 100 ms = 1 L in 1/600 min = 600 L/min
        let err = estimate(
            &Measurement::Pulses {
                count: 100,
                interval_ms: 100,
            },
            MeasureMode::Pulses,
            &cfg(),
        )
        .unwrap_err();
        assert!(matches!(err, IrrigationError::SensorFault(_)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = estimate(
            &Measurement::Elapsed { interval_ms: 0 },
            MeasureMode::Static,
            &cfg(),
        )
        .unwrap_err();
        assert!(matches!(err, IrrigationError::Validation(_)));
    }
}
