//! HTTP webhook server.
//!
//! A single route, `/`, accepts any method.  The handler hands the decoded
//! query pairs and the raw body to the [`Dispatcher`] and answers with the
//! status it returns and an empty body.
//!
//! Shutdown follows the same shared-flag convention as the device agent:
//! `main.rs` clears `running` on Ctrl+C and the server drains in-flight
//! requests before returning.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::application::Dispatcher;
use crate::domain::QueryParams;

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Builds the webhook router.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", any(handle_webhook))
        .with_state(dispatcher)
}

async fn handle_webhook(
    State(dispatcher): State<Arc<Dispatcher>>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> StatusCode {
    dispatcher.handle(QueryParams::from_pairs(pairs), &body).await
}

/// Serves the webhook on `bind_addr` until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(
    bind_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {bind_addr}"))?;
    let local = listener.local_addr().context("listener has no local address")?;
    info!("webhook listening on http://{local}/");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(wait_for_shutdown(running))
        .await
        .context("webhook server failed")?;

    info!("webhook server stopped");
    Ok(())
}

async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
