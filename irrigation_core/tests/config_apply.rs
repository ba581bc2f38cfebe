use crossbeam_channel as xch;
use irrigation_core::mocks::NoopValves;
use irrigation_core::{
    Command, ConfigPatch, ConfigStore, Controller, DeviceProfile, Event, IrrigationError,
    PressureReportMode, RuntimeConfig, TankShape,
};
use rstest::rstest;

fn controller(cfg: RuntimeConfig) -> (Controller, xch::Receiver<Event>) {
    let (tx, rx) = xch::unbounded();
    let ctl = Controller::builder()
        .with_valves(NoopValves)
        .with_profile(DeviceProfile::default())
        .with_config(cfg)
        .with_sink(tx)
        .build()
        .unwrap();
    (ctl, rx)
}

#[test]
fn applying_the_same_change_twice_is_idempotent() {
    let store = ConfigStore::new(RuntimeConfig::default()).unwrap();
    let patch = ConfigPatch {
        data_resolution_l: Some(0.5),
        tank_shape: Some(TankShape::RectangularPrism),
        dimension_3: Some(1.0),
        pressure_report_mode: Some(PressureReportMode::VolumeOnly),
        ..ConfigPatch::default()
    };
    let once = store.apply(&patch).unwrap();
    let twice = store.apply(&patch).unwrap();
    assert_eq!(*once, *twice);
    assert_eq!(twice.data_resolution_l, 0.5);
}

#[rstest]
#[case(ConfigPatch { data_resolution_l: Some(0.0), ..ConfigPatch::default() })]
#[case(ConfigPatch { static_flow_rate: Some(-3.0), ..ConfigPatch::default() })]
#[case(ConfigPatch { pulses_per_l: Some(f32::NAN), ..ConfigPatch::default() })]
#[case(ConfigPatch { min_flow_rate: Some(31.0), ..ConfigPatch::default() })]
#[case(ConfigPatch { dimension_2: Some(-0.1), ..ConfigPatch::default() })]
#[case(ConfigPatch { pressure_per_m: Some(0.0), ..ConfigPatch::default() })]
fn invalid_change_is_rejected_atomically(#[case] patch: ConfigPatch) {
    let (mut ctl, rx) = controller(RuntimeConfig::default());
    let before = ctl.config();
    let bad = ConfigPatch {
        // valid on its own; must not leak through
        tank_timeout_ms: Some(42),
        ..patch
    };
    let err = ctl.handle(Command::ConfigChange(bad)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IrrigationError>(),
        Some(IrrigationError::Validation(_))
    ));
    assert_eq!(*ctl.config(), *before);
    assert!(matches!(
        rx.try_iter().collect::<Vec<_>>().as_slice(),
        [Event::CommandRejected {
            command: "config_change",
            ..
        }]
    ));
}

#[test]
fn change_publishes_new_snapshot() {
    let (mut ctl, rx) = controller(RuntimeConfig::default());
    ctl.handle(Command::ConfigChange(ConfigPatch {
        min_flow_rate: Some(0.5),
        ..ConfigPatch::default()
    }))
    .unwrap();
    match rx.try_recv().unwrap() {
        Event::ConfigSnapshot(cfg) => assert_eq!(cfg.min_flow_rate, 0.5),
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[test]
fn request_and_reset() {
    let base = RuntimeConfig {
        static_flow_rate: 10.0,
        ..RuntimeConfig::default()
    };
    let (mut ctl, rx) = controller(base.clone());
    ctl.handle(Command::ConfigChange(ConfigPatch {
        static_flow_rate: Some(3.0),
        ..ConfigPatch::default()
    }))
    .unwrap();
    ctl.handle(Command::ConfigReset).unwrap();
    ctl.handle(Command::ConfigRequest).unwrap();

    let snaps: Vec<RuntimeConfig> = rx
        .try_iter()
        .filter_map(|e| match e {
            Event::ConfigSnapshot(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(snaps.len(), 3);
    assert_eq!(snaps[0].static_flow_rate, 3.0);
    assert_eq!(snaps[1], base);
    assert_eq!(snaps[2], base);
}

#[test]
fn shared_store_is_visible_to_other_holders() {
    let store = ConfigStore::new(RuntimeConfig::default()).unwrap();
    let mut ctl = Controller::builder()
        .with_valves(NoopValves)
        .with_profile(DeviceProfile::default())
        .with_store(store.clone())
        .build()
        .unwrap();
    ctl.handle(Command::ConfigChange(ConfigPatch {
        tank_timeout_ms: Some(777),
        ..ConfigPatch::default()
    }))
    .unwrap();
    assert_eq!(store.snapshot().tank_timeout_ms, 777);
}
