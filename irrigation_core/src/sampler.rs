//! Background flow-pulse sampling.
//!
//! Spawns a thread that owns the `FlowSensor`, drains its pulse counter once
//! per interval and pushes `Measurement`s through a bounded channel. A full
//! channel blocks the thread, so pulses keep accumulating in the sensor
//! rather than being dropped.
//!
//! Each `Sampler` spawns exactly one thread, shut down and joined on drop.
use crossbeam_channel as xch;
use irrigation_traits::FlowSensor;
use irrigation_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::estimator::Measurement;

/// Measurements buffered between the sampler and the runner.
pub const CHANNEL_CAPACITY: usize = 8;

pub struct Sampler {
    rx: xch::Receiver<Measurement>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<F, C>(mut sensor: F, interval: Duration, clock: C) -> Self
    where
        F: FlowSensor + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut last = clock.now();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }
                clock.sleep(interval);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                let interval_ms = clock.ms_since(last);
                if interval_ms == 0 {
                    continue;
                }
                let m = match sensor.take_pulses() {
                    Ok(count) => Measurement::Pulses { count, interval_ms },
                    Err(e) => {
                        // counts as zero pulses downstream
                        tracing::warn!(error = %e, "flow sensor read failed");
                        Measurement::Elapsed { interval_ms }
                    }
                };
                last = clock.now();

                if tx.send(m).is_err() {
                    tracing::debug!("sampler consumer disconnected, exiting thread");
                    break;
                }
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn receiver(&self) -> &xch::Receiver<Measurement> {
        &self.rx
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Unblock a thread parked on a full channel.
        while self.rx.try_recv().is_ok() {}
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined successfully"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
