//! woop-device entry point.
//!
//! Runs the reference device agent with the logging pin driver.
//!
//! ```text
//! woop-device --endpoint <NAME> --api-key-id <ID> --api-key <KEY> [--layout layout.toml]
//! ```
//!
//! | Variable             | Default         | Description                           |
//! |----------------------|-----------------|---------------------------------------|
//! | `WOOP_ENDPOINT`      | (required)      | Endpoint name relays must ask for     |
//! | `api_key_id`         | (required)      | Accepted API key identifier           |
//! | `api_key`            | (required)      | Accepted API key                      |
//! | `WOOP_DEVICE_BIND`   | `0.0.0.0:24900` | Listener address                      |
//! | `WOOP_LAYOUT`        | built-in wiring | Board layout TOML file                |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use woop_device::domain::{AgentConfig, AgentIdentity, BoardLayout};
use woop_device::infrastructure::pin_driver::LoggingPinDriver;
use woop_device::infrastructure::run_agent;

/// Reference woop device agent.
#[derive(Debug, Parser)]
#[command(
    name = "woop-device",
    about = "Serves a woop GPIO board to relay sessions",
    version
)]
struct Cli {
    /// Endpoint name relays must present in HELLO.
    #[arg(long, env = "WOOP_ENDPOINT")]
    endpoint: String,

    /// Accepted API key identifier.
    #[arg(long, env = "api_key_id")]
    api_key_id: String,

    /// Accepted API key.
    #[arg(long, env = "api_key", hide_env_values = true)]
    api_key: String,

    /// Listener address.
    #[arg(long, default_value = "0.0.0.0:24900", env = "WOOP_DEVICE_BIND")]
    bind: SocketAddr,

    /// Board layout file; the built-in wiring is used when absent.
    #[arg(long, env = "WOOP_LAYOUT")]
    layout: Option<PathBuf>,
}

impl Cli {
    /// Converts the parsed arguments into an [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the layout file cannot be read or is invalid.
    fn into_agent_config(self) -> anyhow::Result<AgentConfig> {
        let layout = match &self.layout {
            Some(path) => BoardLayout::load(path)
                .with_context(|| format!("invalid board layout {}", path.display()))?,
            None => BoardLayout::default(),
        };
        Ok(AgentConfig {
            bind_addr: self.bind,
            identity: AgentIdentity {
                endpoint: self.endpoint,
                api_key_id: self.api_key_id,
                api_key: self.api_key,
            },
            layout,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_agent_config()?;
    info!(endpoint = %config.identity.endpoint, "woop device agent starting");

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

    run_agent(config, Arc::new(LoggingPinDriver::new()), running).await?;

    info!("woop device agent stopped");
    Ok(())
}
