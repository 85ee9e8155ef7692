//! Board layout and agent configuration.
//!
//! The layout can be read from a small TOML file:
//!
//! ```toml
//! name = "board"
//! pins = ["5", "12", "14", "18", "19", "21"]
//! ```
//!
//! Both keys are optional; absent keys take the wiring every woop ships with.
//! Pin handles are 1-based positions in `pins`.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use woop_core::PinName;

/// Handle of the one board an agent serves.
pub const BOARD_HANDLE: u32 = 1;

/// Error type for loading agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading layout at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse layout TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("pin {0} is listed more than once")]
    DuplicatePin(PinName),

    #[error("layout has no pins")]
    NoPins,
}

/// The board component and the GPIO pins it exposes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BoardLayout {
    #[serde(default = "default_board_name")]
    pub name: String,
    #[serde(default = "default_pins")]
    pub pins: Vec<PinName>,
}

fn default_board_name() -> String {
    "board".to_string()
}

fn default_pins() -> Vec<PinName> {
    ["5", "12", "14", "18", "19", "21"]
        .into_iter()
        .map(PinName::from_static)
        .collect()
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            name: default_board_name(),
            pins: default_pins(),
        }
    }
}

impl BoardLayout {
    /// Parses and validates a layout.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let layout: BoardLayout = toml::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Reads a layout file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.is_empty() {
            return Err(ConfigError::NoPins);
        }
        let mut seen = HashSet::with_capacity(self.pins.len());
        for pin in &self.pins {
            if !seen.insert(pin) {
                return Err(ConfigError::DuplicatePin(pin.clone()));
            }
        }
        Ok(())
    }

    pub fn pin_handle(&self, name: &str) -> Option<u32> {
        self.pins
            .iter()
            .position(|p| p.as_str() == name)
            .and_then(|i| u32::try_from(i + 1).ok())
    }

    pub fn pin_by_handle(&self, handle: u32) -> Option<&PinName> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.pins.get(index)
    }
}

/// What a HELLO must carry for this agent to accept it.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub endpoint: String,
    pub api_key_id: String,
    pub api_key: String,
}

impl fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("endpoint", &self.endpoint)
            .field("api_key_id", &self.api_key_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// All runtime configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub bind_addr: SocketAddr,
    pub identity: AgentIdentity,
    pub layout: BoardLayout,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
