//! Pin names and pin writes.
//!
//! A [`PinCommand`] is one transient instruction derived from a webhook
//! request: "drive pin 12 high" or "run pin 19 at 500 Hz, 50 % duty".  It has
//! no identity beyond the single dispatch that produces it.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Validation failures for pin names and values.
#[derive(Debug, Error, PartialEq)]
pub enum PinError {
    #[error("pin name must not be empty")]
    EmptyName,
    #[error("pin name {0:?} contains characters other than ASCII letters, digits, '-' or '_'")]
    InvalidName(String),
    #[error("PWM duty cycle {0} is outside 0.0..=1.0")]
    DutyOutOfRange(f64),
}

/// The board-level name of a GPIO pin, e.g. `"12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct PinName(String);

impl PinName {
    /// Validates and wraps a pin name.
    ///
    /// # Errors
    ///
    /// Returns [`PinError`] for empty names or names with characters that
    /// could not appear in a board's pin map.
    pub fn new(name: impl Into<String>) -> Result<Self, PinError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PinError::EmptyName);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PinError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// Wraps a compile-time pin name from a wiring table.
    ///
    /// The name is checked in debug builds only; wiring tables carry their
    /// own tests.
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "invalid static pin name {name:?}");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PinName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PinName {
    type Error = PinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// What to do to a pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinWrite {
    /// Drive the pin high (`true`) or low (`false`).
    Digital(bool),
    /// Set the PWM frequency, then the duty cycle.
    Pwm { frequency_hz: u32, duty: f64 },
}

/// Checks that a duty cycle is a finite fraction in `0.0..=1.0`.
///
/// # Errors
///
/// Returns [`PinError::DutyOutOfRange`] otherwise.
pub fn validate_duty(duty: f64) -> Result<(), PinError> {
    if (0.0..=1.0).contains(&duty) {
        Ok(())
    } else {
        Err(PinError::DutyOutOfRange(duty))
    }
}

/// A single pin-level instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct PinCommand {
    pub pin: PinName,
    pub write: PinWrite,
}

impl PinCommand {
    pub fn new(pin: PinName, write: PinWrite) -> Self {
        Self { pin, write }
    }
}

impl fmt::Display for PinCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.write {
            PinWrite::Digital(high) => write!(f, "pin {} := {high}", self.pin),
            PinWrite::Pwm { frequency_hz, duty } => {
                write!(f, "pin {} := pwm {frequency_hz} Hz @ {duty}", self.pin)
            }
        }
    }
}
