use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use irrigation_core::mocks::NoopValves;
use irrigation_core::{
    Command, Controller, DeviceProfile, DispenseRequest, Measurement, NullSink, Reservoir,
    ReservoirMode, RuntimeConfig,
};
use irrigation_traits::ManualClock;

// Pulse train for a tank that runs dry halfway through
fn pulse_trace(n: usize, seed: u32) -> Vec<u32> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    (0..n)
        .map(|i| if i < n / 2 { 40 + next() % 20 } else { next() % 2 })
        .collect()
}

fn controller(clock: &ManualClock) -> Controller {
    Controller::builder()
        .with_valves(NoopValves)
        .with_profile(DeviceProfile {
            reservoir_mode: ReservoirMode::Both,
            source_flow_sensor: true,
            drain_valve: true,
            pressure_sensor: true,
        })
        .with_config(RuntimeConfig {
            first_reservoir: Reservoir::Tank,
            ..RuntimeConfig::default()
        })
        .with_clock(Box::new(clock.clone()))
        .with_sink(NullSink)
        .build()
        .expect("valid controller")
}

pub fn bench_on_measurement(c: &mut Criterion) {
    let mut g = c.benchmark_group("on_measurement");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p irrigation_core --bench controller
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let trace = pulse_trace(2_000, 0xC0FFEE);
    g.bench_function("tank_then_source", |b| {
        b.iter_batched(
            || {
                let clock = ManualClock::new();
                let mut ctl = controller(&clock);
                ctl.handle(Command::Dispense(DispenseRequest::new(1_000.0, "bench")))
                    .expect("dispense accepted");
                (ctl, clock)
            },
            |(mut ctl, clock)| {
                for &count in &trace {
                    clock.advance_ms(250);
                    let status = ctl.on_measurement(black_box(Measurement::Pulses {
                        count,
                        interval_ms: 250,
                    }));
                    black_box(status.ok());
                }
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

criterion_group!(controller_benches, bench_on_measurement);
criterion_main!(controller_benches);
