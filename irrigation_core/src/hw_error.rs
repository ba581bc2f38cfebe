//! Maps `Box<dyn Error>` from trait boundaries to typed `IrrigationError`.
//!
//! The traits in `irrigation_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `irrigation_hardware::HwError` downcasting.

use crate::error::IrrigationError;

/// Map a trait-boundary error to a typed `IrrigationError`.
///
/// Known hardware error types are downcast first; anything else falls back to
/// string heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> IrrigationError {
    #[cfg(feature = "hardware-errors")]
    {
        use irrigation_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => IrrigationError::SensorFault("sensor read timed out".into()),
                HwError::OutOfRange(msg) => IrrigationError::SensorFault(msg.clone()),
                other => IrrigationError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        IrrigationError::SensorFault(s)
    } else {
        IrrigationError::Hardware(s)
    }
}
