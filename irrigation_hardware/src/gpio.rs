//! Raspberry Pi GPIO backends via `rppal`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use irrigation_traits::{BoxError, FlowSensor, ValveDriver, ValveId};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// BCM pin numbers for the relays.
#[derive(Debug, Clone, Copy)]
pub struct ValvePins {
    pub source: u8,
    pub tank: u8,
    /// `None` when no drain valve is fitted.
    pub drain: Option<u8>,
}

/// Relay-driven valves. Many relay boards switch on a low level.
pub struct GpioValves {
    source: OutputPin,
    tank: OutputPin,
    drain: Option<OutputPin>,
    active_low: bool,
}

impl GpioValves {
    pub fn new(pins: ValvePins, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let out = |n: u8| -> Result<OutputPin> {
            let mut pin = gpio.get(n).map_err(gpio_err)?.into_output();
            // closed at startup
            if active_low {
                pin.set_high();
            } else {
                pin.set_low();
            }
            Ok(pin)
        };
        let source = out(pins.source)?;
        let tank = out(pins.tank)?;
        let drain = pins.drain.map(&out).transpose()?;
        tracing::info!(
            source = pins.source,
            tank = pins.tank,
            drain = ?pins.drain,
            active_low,
            "gpio valves initialised"
        );
        Ok(Self {
            source,
            tank,
            drain,
            active_low,
        })
    }
}

impl ValveDriver for GpioValves {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> std::result::Result<(), BoxError> {
        let pin = match valve {
            ValveId::Source => &mut self.source,
            ValveId::Tank => &mut self.tank,
            ValveId::Drain => self
                .drain
                .as_mut()
                .ok_or_else(|| Box::new(HwError::NotWired("drain")) as BoxError)?,
        };
        let level = if open != self.active_low {
            Level::High
        } else {
            Level::Low
        };
        pin.write(level);
        Ok(())
    }
}

impl Drop for GpioValves {
    fn drop(&mut self) {
        let off = if self.active_low { Level::High } else { Level::Low };
        self.source.write(off);
        self.tank.write(off);
        if let Some(d) = self.drain.as_mut() {
            d.write(off);
        }
    }
}

/// Hall-effect flow sensor counted on falling edges.
pub struct GpioFlowSensor {
    _pin: InputPin,
    count: Arc<AtomicU32>,
}

impl GpioFlowSensor {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut input = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        input
            .set_async_interrupt(Trigger::FallingEdge, move |_level: Level| {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .map_err(gpio_err)?;
        tracing::info!(pin, "gpio flow sensor initialised");
        Ok(Self { _pin: input, count })
    }
}

impl FlowSensor for GpioFlowSensor {
    fn take_pulses(&mut self) -> std::result::Result<u32, BoxError> {
        Ok(self.count.swap(0, Ordering::Relaxed))
    }
}
