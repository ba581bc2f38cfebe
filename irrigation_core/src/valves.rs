//! Valve bank wrapping a `ValveDriver` and tracking what is open.
//!
//! Opening a supply valve always closes the other supply first, so the
//! source and the tank are never open together.

use eyre::WrapErr;
use irrigation_traits::{ValveDriver, ValveId};

use crate::config::Reservoir;
use crate::error::Result;
use crate::hw_error::map_hw_error;

#[derive(Debug)]
pub struct ValveBank<V> {
    driver: V,
    source_open: bool,
    tank_open: bool,
    drain_open: bool,
}

impl<V: ValveDriver> ValveBank<V> {
    pub fn new(driver: V) -> Self {
        Self {
            driver,
            source_open: false,
            tank_open: false,
            drain_open: false,
        }
    }

    pub fn is_open(&self, valve: ValveId) -> bool {
        match valve {
            ValveId::Source => self.source_open,
            ValveId::Tank => self.tank_open,
            ValveId::Drain => self.drain_open,
        }
    }

    /// The supply valve currently open, if any.
    pub fn open_supply(&self) -> Option<Reservoir> {
        debug_assert!(!(self.source_open && self.tank_open));
        if self.source_open {
            Some(Reservoir::Source)
        } else if self.tank_open {
            Some(Reservoir::Tank)
        } else {
            None
        }
    }

    pub fn driver(&self) -> &V {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut V {
        &mut self.driver
    }

    fn set(&mut self, valve: ValveId, open: bool) -> Result<()> {
        self.driver
            .set_valve(valve, open)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("set {valve} valve {}", if open { "open" } else { "closed" }))?;
        match valve {
            ValveId::Source => self.source_open = open,
            ValveId::Tank => self.tank_open = open,
            ValveId::Drain => self.drain_open = open,
        }
        tracing::debug!(valve = %valve, open, "valve set");
        Ok(())
    }

    /// Open `reservoir`, closing the other supply valve first.
    pub fn open_reservoir(&mut self, reservoir: Reservoir) -> Result<()> {
        let other = reservoir.other().valve();
        if self.is_open(other) {
            self.set(other, false)?;
        }
        self.set(reservoir.valve(), true)
    }

    pub fn close_reservoir(&mut self, reservoir: Reservoir) -> Result<()> {
        self.set(reservoir.valve(), false)
    }

    /// Close both supply valves, attempting each even when the first fails.
    ///
    /// The closed state is recorded regardless so no later transition assumes
    /// water is flowing; the first error is returned.
    pub fn close_supplies(&mut self) -> Result<()> {
        let a = self.set(ValveId::Source, false);
        let b = self.set(ValveId::Tank, false);
        self.source_open = false;
        self.tank_open = false;
        a.and(b)
    }

    pub fn set_drain(&mut self, open: bool) -> Result<()> {
        self.set(ValveId::Drain, open)
    }

    /// Drive every valve closed regardless of tracked state.
    pub fn close_all(&mut self) -> Result<()> {
        let supplies = self.close_supplies();
        let drain = self.set(ValveId::Drain, false);
        self.drain_open = false;
        supplies.and(drain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrrigationError;
    use crate::mocks::RecordingValves;

    #[test]
    fn opening_one_supply_closes_the_other() {
        let mut bank = ValveBank::new(RecordingValves::default());
        bank.open_reservoir(Reservoir::Tank).unwrap();
        bank.open_reservoir(Reservoir::Source).unwrap();
        assert!(bank.is_open(ValveId::Source));
        assert!(!bank.is_open(ValveId::Tank));
        let log = bank.driver().log();
        assert_eq!(
            log,
            vec![
                (ValveId::Tank, true),
                (ValveId::Tank, false),
                (ValveId::Source, true)
            ]
        );
    }

    #[test]
    fn failed_close_still_marks_supplies_closed() {
        let mut bank = ValveBank::new(RecordingValves::default());
        bank.open_reservoir(Reservoir::Source).unwrap();
        bank.driver_mut().fail_on(ValveId::Source);
        let err = bank.close_supplies().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IrrigationError>(),
            Some(IrrigationError::Hardware(_))
        ));
        assert_eq!(bank.open_supply(), None);
    }
}
