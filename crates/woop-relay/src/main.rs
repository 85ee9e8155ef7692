//! woop-relay entry point.
//!
//! Serves the webhook that turns monitoring alerts and simple commands into
//! GPIO writes on remote woops.
//!
//! # Usage
//!
//! ```text
//! woop-relay --api-key <KEY> --api-key-id <ID> --uri-suffix <SUFFIX> --secret <SECRET> [OPTIONS]
//! ```
//!
//! # Environment variables
//!
//! Every option can also come from the environment.  CLI args take
//! precedence when both are present.
//!
//! | Variable              | Default                    | Description                          |
//! |-----------------------|----------------------------|--------------------------------------|
//! | `api_key`             | (required)                 | Device API key                       |
//! | `api_key_id`          | (required)                 | Device API key identifier            |
//! | `uri_suffix`          | (required)                 | Domain suffix of every woop endpoint |
//! | `secret`              | (required)                 | Shared secret for `?secret=`         |
//! | `PORT`                | `8080`                     | HTTP listener port                   |
//! | `WOOP_BIND`           | `0.0.0.0`                  | HTTP listener address                |
//! | `WOOP_DEVICE_PORT`    | `24900`                    | Device agent TCP port                |
//! | `WOOP_DEVICE_ADDR`    | unset                      | Route every endpoint to this socket  |
//! | `WOOP_ALERT_ENDPOINT` | `woop-woop-main.<suffix>`  | Endpoint driven by alert webhooks    |

use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use woop_relay::application::{Connector, Dispatcher, RetryPolicy};
use woop_relay::domain::{Credentials, RelayConfig};
use woop_relay::infrastructure::{run_server, TcpDialer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Webhook relay for woop strobes, buzzers and lamps.
#[derive(Debug, Parser)]
#[command(
    name = "woop-relay",
    about = "Relays webhook alerts and commands to woop GPIO pins",
    version
)]
struct Cli {
    /// API key presented to every device.
    #[arg(long, env = "api_key", hide_env_values = true)]
    api_key: String,

    /// Identifier of the API key.
    #[arg(long, env = "api_key_id")]
    api_key_id: String,

    /// Domain suffix appended to every woop endpoint name.
    #[arg(long, env = "uri_suffix")]
    uri_suffix: String,

    /// Shared secret callers pass as `?secret=`.
    #[arg(long, env = "secret", hide_env_values = true)]
    secret: String,

    /// HTTP listener port.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// HTTP listener address.
    #[arg(long, default_value = "0.0.0.0", env = "WOOP_BIND")]
    bind: String,

    /// TCP port of the device agent on each endpoint.
    #[arg(long, default_value_t = 24900, env = "WOOP_DEVICE_PORT")]
    device_port: u16,

    /// Sends every session to this `host:port` instead of resolving the
    /// endpoint name.  For local development.
    #[arg(long, env = "WOOP_DEVICE_ADDR")]
    device_addr: Option<SocketAddr>,

    /// Endpoint driven by alert webhooks.
    #[arg(long, env = "WOOP_ALERT_ENDPOINT")]
    alert_endpoint: Option<String>,

    /// Name of the board component that owns the pins.
    #[arg(long, default_value = "board")]
    board: String,

    /// Connection attempts per request.
    #[arg(long, default_value_t = 5)]
    connect_attempts: u32,

    /// Upper bound on one connection attempt, in seconds.
    #[arg(long, default_value_t = 20)]
    connect_timeout: u64,

    /// Backoff unit between attempts, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Upper bound on one lookup or write, in seconds.
    #[arg(long, default_value_t = 20)]
    rpc_timeout: u64,
}

impl Cli {
    /// Converts the parsed arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address, or if the suffix or
    /// secret is empty.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", self.bind))?;
        anyhow::ensure!(!self.uri_suffix.is_empty(), "uri_suffix must not be empty");
        anyhow::ensure!(!self.secret.is_empty(), "secret must not be empty");

        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            credentials: Credentials {
                api_key_id: self.api_key_id,
                api_key: self.api_key,
            },
            uri_suffix: self.uri_suffix,
            secret: self.secret,
            alert_endpoint: self.alert_endpoint,
            device_port: self.device_port,
            device_addr_override: self.device_addr,
            board_name: self.board,
            max_connect_attempts: self.connect_attempts,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            backoff_unit: Duration::from_millis(self.backoff_ms),
            rpc_timeout: Duration::from_secs(self.rpc_timeout),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Cli::parse().into_relay_config()?);
    info!(
        bind = %config.bind_addr,
        device_port = config.device_port,
        alert_endpoint = %config.alert_endpoint_id(),
        "woop relay starting"
    );
    if let Some(addr) = config.device_addr_override {
        info!(%addr, "all device sessions routed to override address");
    }

    let dialer = Arc::new(TcpDialer::from_config(&config));
    let connector = Connector::new(
        dialer,
        config.credentials.clone(),
        RetryPolicy::from_config(&config),
    );
    let bind_addr = config.bind_addr;
    let dispatcher = Arc::new(Dispatcher::new(config, connector));

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(bind_addr, dispatcher, running).await?;

    info!("woop relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "woop-relay",
        "--api-key",
        "k",
        "--api-key-id",
        "i",
        "--uri-suffix",
        "abc.viam.cloud",
        "--secret",
        "xyz",
    ];

    fn parse(extra: &[&str]) -> Cli {
        Cli::parse_from(REQUIRED.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn test_cli_defaults() {
        // Arrange / Act
        let cli = parse(&[]);

        // Assert
        assert_eq!(cli.bind, "0.0.0.0");
        assert_eq!(cli.device_port, 24900);
        assert_eq!(cli.board, "board");
        assert_eq!(cli.connect_attempts, 5);
        assert_eq!(cli.connect_timeout, 20);
        assert_eq!(cli.backoff_ms, 1000);
        assert!(cli.device_addr.is_none());
    }

    #[test]
    fn test_missing_secret_is_a_parse_error() {
        let result = Cli::try_parse_from([
            "woop-relay",
            "--api-key",
            "k",
            "--api-key-id",
            "i",
            "--uri-suffix",
            "s",
        ]);
        // Only fails when `secret` is not set in the test environment either.
        if std::env::var_os("secret").is_none() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_into_relay_config_maps_every_field() {
        // Arrange
        let cli = parse(&[
            "--port",
            "9000",
            "--device-addr",
            "127.0.0.1:24901",
            "--backoff-ms",
            "250",
        ]);

        // Act
        let config = cli.into_relay_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.credentials.api_key, "k");
        assert_eq!(config.uri_suffix, "abc.viam.cloud");
        assert_eq!(config.secret, "xyz");
        assert_eq!(
            config.device_addr_override,
            Some("127.0.0.1:24901".parse().unwrap())
        );
        assert_eq!(config.backoff_unit, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let cli = parse(&["--bind", "not-an-ip"]);
        assert!(cli.into_relay_config().is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let mut cli = parse(&[]);
        cli.secret = String::new();
        assert!(cli.into_relay_config().is_err());
    }
}
