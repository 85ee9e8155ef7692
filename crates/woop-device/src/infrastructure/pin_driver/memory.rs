//! In-memory pin driver that logs every write.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;
use woop_core::PinName;

use crate::application::session::{DriverError, PinDriver};

/// Last values written to a pin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PinState {
    pub high: bool,
    pub frequency_hz: u32,
    pub duty: f64,
}

#[derive(Debug, Default)]
pub struct LoggingPinDriver {
    pins: Mutex<HashMap<PinName, PinState>>,
}

impl LoggingPinDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `pin`, or `None` if it was never written.
    pub fn state(&self, pin: &PinName) -> Option<PinState> {
        self.pins.lock().ok()?.get(pin).copied()
    }

    fn update(&self, pin: &PinName, f: impl FnOnce(&mut PinState)) -> Result<(), DriverError> {
        let mut pins = self
            .pins
            .lock()
            .map_err(|_| DriverError::Unavailable("pin state lock poisoned".to_string()))?;
        f(pins.entry(pin.clone()).or_default());
        Ok(())
    }
}

impl PinDriver for LoggingPinDriver {
    fn set_digital(&self, pin: &PinName, high: bool) -> Result<(), DriverError> {
        self.update(pin, |s| s.high = high)?;
        info!(%pin, high, "gpio set");
        Ok(())
    }

    fn set_pwm_frequency(&self, pin: &PinName, frequency_hz: u32) -> Result<(), DriverError> {
        self.update(pin, |s| s.frequency_hz = frequency_hz)?;
        info!(%pin, frequency_hz, "pwm frequency set");
        Ok(())
    }

    fn set_pwm_duty(&self, pin: &PinName, duty: f64) -> Result<(), DriverError> {
        self.update(pin, |s| s.duty = duty)?;
        info!(%pin, duty, "pwm duty set");
        Ok(())
    }
}
