//! Test and helper mocks for irrigation_core

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use irrigation_traits::{BoxError, ValveDriver, ValveId};

/// Valve driver that accepts every command and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValves;

impl ValveDriver for NoopValves {
    fn set_valve(&mut self, _valve: ValveId, _open: bool) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    log: Vec<(ValveId, bool)>,
    open: HashSet<ValveId>,
    blended: bool,
    failing: HashSet<ValveId>,
}

/// Valve driver that records every command and notices if both supplies were
/// ever open at once. Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingValves {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingValves {
    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    pub fn log(&self) -> Vec<(ValveId, bool)> {
        self.with(|r| r.log.clone())
    }

    pub fn is_open(&self, valve: ValveId) -> bool {
        self.with(|r| r.open.contains(&valve))
    }

    /// True if source and tank were ever open at the same time.
    pub fn blended(&self) -> bool {
        self.with(|r| r.blended)
    }

    /// Make every later command on `valve` fail.
    pub fn fail_on(&self, valve: ValveId) {
        self.with(|r| {
            r.failing.insert(valve);
        });
    }

    pub fn clear_failures(&self) {
        self.with(|r| r.failing.clear());
    }
}

impl ValveDriver for RecordingValves {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), BoxError> {
        self.with(|r| {
            if r.failing.contains(&valve) {
                return Err(format!("{valve} relay not responding").into());
            }
            r.log.push((valve, open));
            if open {
                r.open.insert(valve);
            } else {
                r.open.remove(&valve);
            }
            if r.open.contains(&ValveId::Source) && r.open.contains(&ValveId::Tank) {
                r.blended = true;
            }
            Ok(())
        })
    }
}
