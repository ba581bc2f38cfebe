//! Pressure to height to volume translation for the tank.

use std::f32::consts::PI;

use crate::config::{PressureReportMode, RuntimeConfig, TankShape};
use crate::error::IrrigationError;

/// Slack (m) allowed outside the physical height range before a reading is a fault.
pub const HEIGHT_TOLERANCE_M: f32 = 0.02;

/// A tank whose liquid column is at or below this height (m) is empty.
pub const EMPTY_HEIGHT_M: f32 = 0.005;

const LITERS_PER_M3: f32 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankGeometry {
    pub shape: TankShape,
    pub dimension_1: f32,
    pub dimension_2: f32,
    pub dimension_3: f32,
}

impl From<&RuntimeConfig> for TankGeometry {
    fn from(c: &RuntimeConfig) -> Self {
        Self {
            shape: c.tank_shape,
            dimension_1: c.dimension_1,
            dimension_2: c.dimension_2,
            dimension_3: c.dimension_3,
        }
    }
}

impl TankGeometry {
    /// Horizontal cross-section in m².
    pub fn base_area_m2(&self) -> Result<f32, IrrigationError> {
        match self.shape {
            TankShape::RectangularPrism => {
                if self.dimension_1 <= 0.0 || self.dimension_2 <= 0.0 {
                    return Err(IrrigationError::InvalidGeometry(
                        "prism length and width must be > 0".into(),
                    ));
                }
                Ok(self.dimension_1 * self.dimension_2)
            }
            TankShape::Cylinder => {
                if self.dimension_1 <= 0.0 {
                    return Err(IrrigationError::InvalidGeometry(
                        "cylinder radius must be > 0".into(),
                    ));
                }
                Ok(PI * self.dimension_1 * self.dimension_1)
            }
        }
    }

    /// Configured tank height, if one is set.
    pub fn max_height_m(&self) -> Option<f32> {
        let h = match self.shape {
            TankShape::RectangularPrism => self.dimension_3,
            TankShape::Cylinder => self.dimension_2,
        };
        (h > 0.0).then_some(h)
    }

    pub fn volume_m3(&self, height_m: f32) -> Result<f32, IrrigationError> {
        Ok(self.base_area_m2()? * height_m)
    }

    pub fn height_from_volume(&self, volume_m3: f32) -> Result<f32, IrrigationError> {
        Ok(volume_m3 / self.base_area_m2()?)
    }

    /// Full-tank capacity in liters, when the height is configured.
    pub fn capacity_l(&self) -> Result<Option<f32>, IrrigationError> {
        match self.max_height_m() {
            Some(h) => Ok(Some(self.volume_m3(h)? * LITERS_PER_M3)),
            None => Ok(None),
        }
    }
}

/// Liquid height (m) for a raw pressure reading.
///
/// Small negative heights clamp to zero; anything further outside the
/// physical range is a sensor fault.
pub fn height_from_pressure(pressure: f32, cfg: &RuntimeConfig) -> Result<f32, IrrigationError> {
    if !pressure.is_finite() {
        return Err(IrrigationError::SensorFault(format!(
            "non-finite pressure reading {pressure}"
        )));
    }
    let height = (pressure - cfg.pressure_offset) / cfg.pressure_per_m;
    if height < -HEIGHT_TOLERANCE_M {
        return Err(IrrigationError::SensorFault(format!(
            "pressure {pressure} gives negative height {height:.3} m"
        )));
    }
    if let Some(max) = TankGeometry::from(cfg).max_height_m()
        && height > max + HEIGHT_TOLERANCE_M
    {
        return Err(IrrigationError::SensorFault(format!(
            "pressure {pressure} gives height {height:.3} m above tank height {max:.3} m"
        )));
    }
    Ok(height.max(0.0))
}

/// Last-known tank state derived from a pressure reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankReading {
    pub pressure: f32,
    pub height_m: f32,
    /// `None` when the tank shape is not configured and the report mode
    /// does not ask for volume.
    pub volume_l: Option<f32>,
}

impl TankReading {
    pub fn is_empty(&self) -> bool {
        self.height_m <= EMPTY_HEIGHT_M
    }
}

/// Translate a pressure reading into height and, when possible, volume.
///
/// Geometry is only required when the report mode includes volume.
pub fn translate(pressure: f32, cfg: &RuntimeConfig) -> Result<TankReading, IrrigationError> {
    let height_m = height_from_pressure(pressure, cfg)?;
    let volume_l = match TankGeometry::from(cfg).volume_m3(height_m) {
        Ok(m3) => Some(m3 * LITERS_PER_M3),
        Err(e) if cfg.pressure_report_mode.includes_volume() => return Err(e),
        Err(_) => None,
    };
    Ok(TankReading {
        pressure,
        height_m,
        volume_l,
    })
}

/// Fields of a pressure report, selected by the report mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReport {
    pub pressure: Option<f32>,
    pub volume_l: Option<f32>,
}

impl PressureReport {
    pub fn new(reading: &TankReading, mode: PressureReportMode) -> Self {
        match mode {
            PressureReportMode::PressureOnly => Self {
                pressure: Some(reading.pressure),
                volume_l: None,
            },
            PressureReportMode::VolumeOnly => Self {
                pressure: None,
                volume_l: reading.volume_l,
            },
            PressureReportMode::Both => Self {
                pressure: Some(reading.pressure),
                volume_l: reading.volume_l,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cylinder() -> RuntimeConfig {
        RuntimeConfig {
            tank_shape: TankShape::Cylinder,
            dimension_1: 0.4,
            dimension_2: 1.2,
            dimension_3: 0.0,
            pressure_per_m: 10_000.0,
            pressure_offset: 0.0,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn cylinder_round_trip() {
        let g = TankGeometry::from(&cylinder());
        let v = g.volume_m3(1.2).unwrap();
        assert!((v - 0.603).abs() < 1e-3, "got {v}");
        let h = g.height_from_volume(v).unwrap();
        assert!((h - 1.2).abs() < 1e-5);
    }

    #[test]
    fn prism_volume() {
        let g = TankGeometry {
            shape: TankShape::RectangularPrism,
            dimension_1: 2.0,
            dimension_2: 0.5,
            dimension_3: 1.0,
        };
        assert!((g.volume_m3(0.5).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(g.capacity_l().unwrap(), Some(1_000.0));
    }

    #[rstest]
    #[case(TankShape::Cylinder, 0.0, 1.0)]
    #[case(TankShape::RectangularPrism, 1.0, 0.0)]
    fn zero_dimension_is_invalid(#[case] shape: TankShape, #[case] d1: f32, #[case] d2: f32) {
        let g = TankGeometry {
            shape,
            dimension_1: d1,
            dimension_2: d2,
            dimension_3: 0.0,
        };
        assert!(matches!(
            g.volume_m3(1.0),
            Err(IrrigationError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn translate_reports_liters() {
        let r = translate(6_000.0, &cylinder()).unwrap();
        assert!((r.height_m - 0.6).abs() < 1e-5);
        let v = r.volume_l.unwrap();
        assert!((v - 301.59).abs() < 0.1, "got {v}");
        assert!(!r.is_empty());
    }

    #[test]
    fn slightly_negative_height_clamps_to_zero() {
        let r = translate(-100.0, &cylinder()).unwrap();
        assert_eq!(r.height_m, 0.0);
        assert!(r.is_empty());
    }

    #[rstest]
    #[case(f32::NAN)]
    #[case(-5_000.0)]
    #[case(20_000.0)]
    fn out_of_range_pressure_is_a_fault(#[case] p: f32) {
        assert!(matches!(
            translate(p, &cylinder()),
            Err(IrrigationError::SensorFault(_))
        ));
    }

    #[test]
    fn pressure_only_mode_needs_no_geometry() {
        let cfg = RuntimeConfig {
            dimension_1: 0.0,
            pressure_report_mode: PressureReportMode::PressureOnly,
            ..cylinder()
        };
        let r = translate(5_000.0, &cfg).unwrap();
        assert!((r.height_m - 0.5).abs() < 1e-5);
        assert_eq!(r.volume_l, None);
    }

    #[rstest]
    #[case(PressureReportMode::VolumeOnly)]
    #[case(PressureReportMode::Both)]
    fn volume_modes_still_reject_missing_geometry(#[case] mode: PressureReportMode) {
        let cfg = RuntimeConfig {
            dimension_1: 0.0,
            pressure_report_mode: mode,
            ..cylinder()
        };
        assert!(matches!(
            translate(5_000.0, &cfg),
            Err(IrrigationError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn report_mode_selects_fields() {
        let r = TankReading {
            pressure: 1.0,
            height_m: 0.1,
            volume_l: Some(2.0),
        };
        let p = PressureReport::new(&r, PressureReportMode::PressureOnly);
        assert_eq!((p.pressure, p.volume_l), (Some(1.0), None));
        let v = PressureReport::new(&r, PressureReportMode::VolumeOnly);
        assert_eq!((v.pressure, v.volume_l), (None, Some(2.0)));
    }
}
