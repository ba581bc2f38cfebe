use irrigation_core::mocks::NoopValves;
use irrigation_core::{BuildError, Controller, DeviceProfile, ReservoirMode, RuntimeConfig};
use rstest::rstest;

#[rstest]
fn builder_missing_valves_yields_typed_build_error() {
    let err = Controller::builder()
        .with_profile(DeviceProfile::default())
        .try_build()
        .expect_err("should fail with MissingValves");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingValves) => {}
        other => panic!("expected MissingValves, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_profile_yields_typed_build_error() {
    let err = Controller::builder()
        .with_valves(NoopValves)
        .try_build()
        .expect_err("should fail with MissingProfile");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingProfile)
    ));
}

#[rstest]
fn builder_rejects_invalid_runtime_config() {
    let err = Controller::builder()
        .with_valves(NoopValves)
        .with_profile(DeviceProfile::default())
        .with_config(RuntimeConfig {
            min_flow_rate: 50.0,
            ..RuntimeConfig::default()
        })
        .build()
        .expect_err("min >= max must fail");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains("min_flow_rate")),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn metered_source_without_source_is_invalid() {
    let err = Controller::builder()
        .with_valves(NoopValves)
        .with_profile(DeviceProfile {
            reservoir_mode: ReservoirMode::TankOnly,
            source_flow_sensor: true,
            drain_valve: false,
            pressure_sensor: false,
        })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}
