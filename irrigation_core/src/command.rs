//! Inbound commands, already decoded from the transport.

use crate::config::ConfigPatch;
use crate::error::IrrigationError;

#[derive(Debug, Clone, PartialEq)]
pub struct DispenseRequest {
    pub target_volume_l: f32,
    pub request_id: String,
}

impl DispenseRequest {
    pub fn new(target_volume_l: f32, request_id: impl Into<String>) -> Self {
        Self {
            target_volume_l,
            request_id: request_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), IrrigationError> {
        if !self.target_volume_l.is_finite() || self.target_volume_l <= 0.0 {
            return Err(IrrigationError::Validation(format!(
                "target volume must be a finite number > 0, got {}",
                self.target_volume_l
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispense(DispenseRequest),
    Deactivate,
    DrainActivate,
    DrainDeactivate,
    ConfigChange(ConfigPatch),
    /// Publish the current config snapshot.
    ConfigRequest,
    /// Restore the provisioned config.
    ConfigReset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Dispense(_) => "dispense",
            Command::Deactivate => "deactivate",
            Command::DrainActivate => "drain_activate",
            Command::DrainDeactivate => "drain_deactivate",
            Command::ConfigChange(_) => "config_change",
            Command::ConfigRequest => "config_request",
            Command::ConfigReset => "config_reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    fn non_positive_or_non_finite_volume_is_rejected(#[case] v: f32) {
        let err = DispenseRequest::new(v, "r").validate().unwrap_err();
        assert!(matches!(err, IrrigationError::Validation(_)));
    }
}
