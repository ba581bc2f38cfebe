use std::sync::Arc;
use std::time::Duration;

use irrigation_hardware::{PlantParams, SimPlant};
use irrigation_traits::{FlowSensor, ManualClock, PressureSensor, ValveDriver, ValveId};
use rstest::rstest;

fn plant(params: PlantParams) -> (SimPlant, ManualClock) {
    let clock = ManualClock::new();
    (SimPlant::with_clock(params, Arc::new(clock.clone())), clock)
}

#[rstest]
#[case(0.0, 0.0)]
#[case(250.0, 5_000.0)]
#[case(500.0, 10_000.0)]
fn pressure_follows_level(#[case] level_l: f32, #[case] expected: f32) {
    let (p, _clock) = plant(PlantParams {
        tank_level_l: level_l,
        tank_area_m2: 0.5,
        pressure_per_m: 10_000.0,
        ..PlantParams::default()
    });
    let got = p.pressure_sensor().read(Duration::from_millis(5)).unwrap();
    assert!((got - expected).abs() < 0.5, "{got} vs {expected}");
}

#[test]
fn drain_empties_tank_without_delivering() {
    let (p, clock) = plant(PlantParams {
        tank_level_l: 10.0,
        drain_rate_l_min: 20.0,
        ..PlantParams::default()
    });
    p.valves().set_valve(ValveId::Drain, true).unwrap();
    clock.advance(Duration::from_secs(15));
    assert!((p.tank_level_l() - 5.0).abs() < 1e-3);
    clock.advance(Duration::from_secs(60));
    assert_eq!(p.tank_level_l(), 0.0);
    assert_eq!(p.delivered_l(), 0.0);
    assert_eq!(p.flow_sensor().take_pulses().unwrap(), 0);
}

#[test]
fn metered_source_pulses_and_never_runs_dry() {
    let (p, clock) = plant(PlantParams {
        source_rate_l_min: 6.0,
        pulses_per_l: 100.0,
        source_metered: true,
        tank_level_l: 0.0,
        ..PlantParams::default()
    });
    p.valves().set_valve(ValveId::Source, true).unwrap();
    clock.advance(Duration::from_secs(10));
    // 6 L/min for 10 s = 1 L
    assert_eq!(p.flow_sensor().take_pulses().unwrap(), 100);
    clock.advance(Duration::from_secs(10));
    assert_eq!(p.flow_sensor().take_pulses().unwrap(), 100);
}

#[test]
fn capacity_clamps_level() {
    let (p, _clock) = plant(PlantParams {
        tank_level_l: 50.0,
        tank_capacity_l: Some(20.0),
        ..PlantParams::default()
    });
    p.set_tank_level(30.0);
    assert_eq!(p.tank_level_l(), 20.0);
}

#[test]
fn failure_can_be_cleared() {
    let (p, _clock) = plant(PlantParams::default());
    p.set_failing(Some(ValveId::Source));
    assert!(p.valves().set_valve(ValveId::Source, true).is_err());
    p.set_failing(None);
    p.valves().set_valve(ValveId::Source, true).unwrap();
    assert!(p.is_open(ValveId::Source));
}
