//! Inbound webhook requests.
//!
//! Query strings and JSON bodies are turned into typed values here.  A
//! missing or wrongly typed body field becomes [`RelayError::Validation`],
//! never a silent default.

use std::fmt;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::error::Category;
use woop_core::domain::pin::validate_duty;

use crate::domain::error::RelayError;

/// The three request shapes the webhook accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// No query string: a monitoring-alert JSON body drives the strobe.
    Alert,
    /// Query-string command for strobe and buzzer.
    Basic,
    /// `v=3`: JSON body with RGB lamp PWM settings and a buzzer flag.
    Color,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Alert => "alert",
            Variant::Basic => "basic",
            Variant::Color => "color",
        };
        f.write_str(name)
    }
}

// ── Query string ──────────────────────────────────────────────────────────────

/// Decoded query parameters in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Selects the handling path: no parameters at all is an alert, `v=3`
    /// the colour variant, anything else the basic variant.
    pub fn variant(&self) -> Variant {
        if self.is_empty() {
            Variant::Alert
        } else if self.get("v") == Some("3") {
            Variant::Color
        } else {
            Variant::Basic
        }
    }

    /// Checks the `secret` parameter against the configured secret.
    ///
    /// An empty configured secret rejects every request.
    pub fn authorize(&self, expected: &str) -> Result<(), RelayError> {
        match self.get("secret") {
            Some(given) if !expected.is_empty() && constant_time_eq(given, expected) => Ok(()),
            _ => Err(RelayError::Unauthorized),
        }
    }

    /// The `woop` device number, empty when absent.
    pub fn woop_number(&self) -> &str {
        self.get("woop").unwrap_or_default()
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn is_on(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("on"))
}

/// Strobe and buzzer switches of the basic variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicRequest {
    pub strobe: bool,
    pub buzzer: bool,
}

impl BasicRequest {
    /// `"on"` in any case switches a line on; anything else, or nothing,
    /// switches it off.
    pub fn from_query(query: &QueryParams) -> Self {
        Self {
            strobe: is_on(query.get("strobe")),
            buzzer: is_on(query.get("buzzer")),
        }
    }
}

// ── JSON bodies ───────────────────────────────────────────────────────────────

/// Decodes a JSON body.  Broken JSON is [`RelayError::Decode`]; JSON that
/// does not fit `T` (missing field, wrong type, explicit `null`, out-of-range
/// value) is [`RelayError::Validation`].
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => RelayError::Validation(e.to_string()),
        Category::Syntax | Category::Eof | Category::Io => RelayError::Decode(e),
    })
}

/// Optional field that may be absent but not `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Monitoring alert envelope: `{"incident": {...}}`.  Other fields are
/// ignored.
#[derive(Debug, Deserialize)]
struct AlertBody {
    incident: AlertPayload,
}

/// The part of a monitoring alert the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertPayload {
    pub summary: String,
    pub state: String,
}

impl AlertPayload {
    /// Parses `{"incident": {"summary": "...", "state": "..."}}`.
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        decode_body::<AlertBody>(body).map(|b| b.incident)
    }

    /// An alert whose state is `open` (any case) raises the strobe.
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

/// One lamp channel as sent on the wire.
#[derive(Debug, Deserialize)]
struct ChannelBody {
    freq: f64,
    duty: f64,
}

/// PWM setting for one lamp channel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "ChannelBody")]
pub struct ColorSetting {
    pub frequency_hz: u32,
    pub duty: f64,
}

impl TryFrom<ChannelBody> for ColorSetting {
    type Error = String;

    fn try_from(raw: ChannelBody) -> Result<Self, Self::Error> {
        let ChannelBody { freq, duty } = raw;
        if !(freq.is_finite() && freq >= 0.0 && freq <= f64::from(u32::MAX) && freq.fract() == 0.0) {
            return Err(format!("freq must be a whole number of hertz, got {freq}"));
        }
        validate_duty(duty).map_err(|e| e.to_string())?;
        Ok(Self {
            frequency_hz: freq as u32,
            duty,
        })
    }
}

/// Body of the colour variant.  Absent keys leave their pin untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColorRequest {
    #[serde(default, deserialize_with = "present")]
    pub red: Option<ColorSetting>,
    #[serde(default, deserialize_with = "present")]
    pub green: Option<ColorSetting>,
    #[serde(default, deserialize_with = "present")]
    pub blue: Option<ColorSetting>,
    #[serde(default, deserialize_with = "present")]
    pub buzzer: Option<bool>,
}

impl ColorRequest {
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        decode_body(body)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
