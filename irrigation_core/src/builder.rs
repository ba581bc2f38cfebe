//! Type-state builder for `Controller` and generic `build_controller` constructor.
//!
//! The builder enforces at compile time that valves and a device profile are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use irrigation_traits::clock::{Clock, MonotonicClock};
use irrigation_traits::ValveDriver;

use crate::config::{ConfigStore, DeviceProfile, RuntimeConfig};
use crate::controller::Controller;
use crate::drain::DrainController;
use crate::error::{BuildError, Result};
use crate::events::{NullSink, ReportSink};
use crate::valves::ValveBank;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for the boxed `Controller`.
pub struct ControllerBuilder<V, P> {
    valves: Option<Box<dyn ValveDriver + Send>>,
    profile: Option<DeviceProfile>,
    config: Option<RuntimeConfig>,
    store: Option<ConfigStore>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn ReportSink + Send>>,
    _v: PhantomData<V>,
    _p: PhantomData<P>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            valves: None,
            profile: None,
            config: None,
            store: None,
            clock: None,
            sink: None,
            _v: PhantomData,
            _p: PhantomData,
        }
    }
}

impl Controller {
    /// Start building a Controller.
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }
}

/// Validate configuration and construct a `Controller`.
///
/// Shared by `ControllerBuilder::try_build()` and `build_controller()`.
fn validate_and_build<V: ValveDriver>(
    valves: V,
    profile: DeviceProfile,
    store: ConfigStore,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn ReportSink + Send>>,
) -> Result<Controller<V>> {
    if profile.source_flow_sensor && !profile.has_source() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "source_flow_sensor set without a source reservoir".into(),
        )));
    }
    if (profile.drain_valve || profile.pressure_sensor) && !profile.has_tank() {
        tracing::warn!(
            drain_valve = profile.drain_valve,
            pressure_sensor = profile.pressure_sensor,
            "tank accessories configured without a tank; they will be ignored"
        );
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();

    Ok(Controller {
        valves: ValveBank::new(valves),
        profile,
        config: store,
        clock,
        epoch,
        sink: sink.unwrap_or_else(|| Box::new(NullSink)),
        session: None,
        drain: DrainController::default(),
        tank: None,
        last_summary: None,
    })
}

fn resolve_store(
    store: Option<ConfigStore>,
    config: Option<RuntimeConfig>,
) -> Result<ConfigStore> {
    match (store, config) {
        (Some(s), _) => Ok(s),
        (None, cfg) => ConfigStore::new(cfg.unwrap_or_default())
            .map_err(|e| eyre::Report::new(BuildError::InvalidConfig(e.to_string()))),
    }
}

impl<V, P> ControllerBuilder<V, P> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Controller> {
        let valves = self
            .valves
            .ok_or_else(|| eyre::Report::new(BuildError::MissingValves))?;
        let profile = self
            .profile
            .ok_or_else(|| eyre::Report::new(BuildError::MissingProfile))?;
        let store = resolve_store(self.store, self.config)?;
        validate_and_build(valves, profile, store, self.clock, self.sink)
    }

    /// Initial runtime config; validated at build. Ignored when a store is given.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing config store.
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where events go; defaults to discarding them.
    pub fn with_sink(mut self, sink: impl ReportSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

// Setters that advance type-state
impl<P> ControllerBuilder<Missing, P> {
    pub fn with_valves(
        self,
        valves: impl ValveDriver + Send + 'static,
    ) -> ControllerBuilder<Set, P> {
        ControllerBuilder {
            valves: Some(Box::new(valves)),
            profile: self.profile,
            config: self.config,
            store: self.store,
            clock: self.clock,
            sink: self.sink,
            _v: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<V> ControllerBuilder<V, Missing> {
    pub fn with_profile(self, profile: DeviceProfile) -> ControllerBuilder<V, Set> {
        ControllerBuilder {
            valves: self.valves,
            profile: Some(profile),
            config: self.config,
            store: self.store,
            clock: self.clock,
            sink: self.sink,
            _v: PhantomData,
            _p: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available once valves and profile are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}

/// Build a statically-dispatched controller from a concrete valve driver.
pub fn build_controller<V: ValveDriver>(
    valves: V,
    profile: DeviceProfile,
    config: RuntimeConfig,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn ReportSink + Send>>,
) -> Result<Controller<V>> {
    let store = resolve_store(None, Some(config))?;
    validate_and_build(valves, profile, store, clock, sink)
}
