//! Relay configuration types.
//!
//! [`RelayConfig`] is loaded once at process start (see `main.rs`) and then
//! shared read-only behind an `Arc`.  No request handler reads the
//! environment.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::endpoint::EndpointId;

/// Outbound API-key credentials presented to every device.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key_id: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key_id", &self.api_key_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// All runtime configuration for the relay.
#[derive(Clone)]
pub struct RelayConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// Credentials for the outbound device session.
    pub credentials: Credentials,

    /// Domain suffix appended to every woop endpoint name, e.g.
    /// `abc123.viam.cloud`.
    pub uri_suffix: String,

    /// Shared secret callers must pass as `?secret=` on the command variants.
    pub secret: String,

    /// Endpoint the no-query alert webhook drives.  `None` means
    /// `woop-woop-main.<uri_suffix>`.
    pub alert_endpoint: Option<String>,

    /// TCP port of the device agent on every endpoint.
    pub device_port: u16,

    /// Routes every endpoint to this socket instead of resolving its name.
    /// The endpoint name is still sent in the handshake.
    pub device_addr_override: Option<SocketAddr>,

    /// Name of the board component that owns the GPIO pins.
    pub board_name: String,

    /// Connection attempts before a request fails with 404.
    pub max_connect_attempts: u32,

    /// Upper bound on a single connection attempt (dial + handshake).
    pub connect_timeout: Duration,

    /// Wait before attempt *i* is `i × backoff_unit`.
    pub backoff_unit: Duration,

    /// Upper bound on a single lookup or write round trip.
    pub rpc_timeout: Duration,
}

impl RelayConfig {
    /// Endpoint driven by the no-query alert webhook.
    pub fn alert_endpoint_id(&self) -> EndpointId {
        match &self.alert_endpoint {
            Some(name) => EndpointId::configured(name.clone()),
            None => EndpointId::alert(&self.uri_suffix),
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("credentials", &self.credentials)
            .field("uri_suffix", &self.uri_suffix)
            .field("secret", &"<redacted>")
            .field("alert_endpoint", &self.alert_endpoint)
            .field("device_port", &self.device_port)
            .field("device_addr_override", &self.device_addr_override)
            .field("board_name", &self.board_name)
            .field("max_connect_attempts", &self.max_connect_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .field("backoff_unit", &self.backoff_unit)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}

impl Default for RelayConfig {
    /// Local-development defaults.  Credentials, suffix and secret are empty
    /// and must be supplied before the relay is useful.
    ///
    /// | Field                | Default         |
    /// |----------------------|-----------------|
    /// | bind_addr            | `0.0.0.0:8080`  |
    /// | device_port          | `24900`         |
    /// | board_name           | `board`         |
    /// | max_connect_attempts | 5               |
    /// | connect_timeout      | 20 seconds      |
    /// | backoff_unit         | 1 second        |
    /// | rpc_timeout          | 20 seconds      |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            credentials: Credentials {
                api_key_id: String::new(),
                api_key: String::new(),
            },
            uri_suffix: String::new(),
            secret: String::new(),
            alert_endpoint: None,
            device_port: 24900,
            device_addr_override: None,
            board_name: "board".to_string(),
            max_connect_attempts: 5,
            connect_timeout: Duration::from_secs(20),
            backoff_unit: Duration::from_secs(1),
            rpc_timeout: Duration::from_secs(20),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy_matches_single_use_session_budget() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.max_connect_attempts, 5);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(20));
        assert_eq!(cfg.backoff_unit, Duration::from_secs(1));
    }

    #[test]
    fn test_default_board_name() {
        assert_eq!(RelayConfig::default().board_name, "board");
    }

    #[test]
    fn test_alert_endpoint_derived_from_suffix() {
        // Arrange
        let cfg = RelayConfig {
            uri_suffix: "abc.viam.cloud".to_string(),
            ..RelayConfig::default()
        };

        // Act / Assert
        assert_eq!(cfg.alert_endpoint_id().host(), "woop-woop-main.abc.viam.cloud");
    }

    #[test]
    fn test_explicit_alert_endpoint_wins() {
        let cfg = RelayConfig {
            uri_suffix: "abc.viam.cloud".to_string(),
            alert_endpoint: Some("lab-woop.example".to_string()),
            ..RelayConfig::default()
        };
        assert_eq!(cfg.alert_endpoint_id().host(), "lab-woop.example");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        // Arrange
        let cfg = RelayConfig {
            credentials: Credentials {
                api_key_id: "visible-id".to_string(),
                api_key: "hidden-key".to_string(),
            },
            secret: "hidden-secret".to_string(),
            ..RelayConfig::default()
        };

        // Act
        let rendered = format!("{cfg:?}");

        // Assert
        assert!(rendered.contains("visible-id"));
        assert!(!rendered.contains("hidden-key"));
        assert!(!rendered.contains("hidden-secret"));
    }
}
