//! Recording pin driver for tests.
//!
//! Every call is pushed into `calls` in order.  Pins listed in `failing_pins`
//! (or every pin, with `should_fail`) return [`DriverError::Hardware`]
//! without being recorded.
//!
//! ```ignore
//! let driver = Arc::new(MockPinDriver::new());
//! // ... run a session against it ...
//! assert_eq!(driver.calls(), [DriverCall::Digital(PinName::from_static("12"), true)]);
//! ```

use std::sync::Mutex;

use woop_core::PinName;

use crate::application::session::{DriverError, PinDriver};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Digital(PinName, bool),
    PwmFrequency(PinName, u32),
    PwmDuty(PinName, f64),
}

impl DriverCall {
    pub fn pin(&self) -> &PinName {
        match self {
            DriverCall::Digital(pin, _)
            | DriverCall::PwmFrequency(pin, _)
            | DriverCall::PwmDuty(pin, _) => pin,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockPinDriver {
    pub calls: Mutex<Vec<DriverCall>>,
    /// When `true`, every write fails.
    pub should_fail: bool,
    pub failing_pins: Vec<PinName>,
}

impl MockPinDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose writes to `pins` fail.
    pub fn failing_on<'a>(pins: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing_pins: pins
                .into_iter()
                .filter_map(|p| PinName::new(p).ok())
                .collect(),
            ..Self::default()
        }
    }

    /// Snapshot of the calls recorded so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        if self.should_fail || self.failing_pins.contains(call.pin()) {
            return Err(DriverError::Hardware {
                pin: call.pin().clone(),
                reason: "injected failure".to_string(),
            });
        }
        self.calls
            .lock()
            .map_err(|_| DriverError::Unavailable("mock lock poisoned".to_string()))?
            .push(call);
        Ok(())
    }
}

impl PinDriver for MockPinDriver {
    fn set_digital(&self, pin: &PinName, high: bool) -> Result<(), DriverError> {
        self.record(DriverCall::Digital(pin.clone(), high))
    }

    fn set_pwm_frequency(&self, pin: &PinName, frequency_hz: u32) -> Result<(), DriverError> {
        self.record(DriverCall::PwmFrequency(pin.clone(), frequency_hz))
    }

    fn set_pwm_duty(&self, pin: &PinName, duty: f64) -> Result<(), DriverError> {
        self.record(DriverCall::PwmDuty(pin.clone(), duty))
    }
}
