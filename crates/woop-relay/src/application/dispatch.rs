//! Dispatcher: one webhook request in, one HTTP status out.
//!
//! Stages run strictly in order and each failure ends the request:
//!
//! 1. select the [`Variant`] from the query shape;
//! 2. authorize (basic and colour variants only);
//! 3. parse and validate the query or body into a [`WritePlan`];
//! 4. connect, resolve the board and the plan's pins, apply the writes;
//! 5. close the session.
//!
//! Step 4 and 5 live in [`execute`], the only place a session is opened.
//! It closes the session exactly once whatever step 4 returned.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;
use woop_core::{PinCommand, PinName, PinWrite};

use crate::application::connector::{Connector, DeviceSession, PinHandle};
use crate::domain::wiring;
use crate::domain::{
    AlertPayload, BasicRequest, ColorRequest, EndpointId, QueryParams, RelayConfig, RelayError,
    Variant,
};

/// Everything one request will do to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub endpoint: EndpointId,
    /// Pins resolved up front, before any write.
    pub pins: Vec<PinName>,
    /// Writes in execution order.
    pub commands: Vec<PinCommand>,
}

/// Turns webhook requests into device sessions.
pub struct Dispatcher {
    config: Arc<RelayConfig>,
    connector: Connector,
}

impl Dispatcher {
    pub fn new(config: Arc<RelayConfig>, connector: Connector) -> Self {
        Self { config, connector }
    }

    /// Handles one request and returns the status to answer with.
    pub async fn handle(&self, query: QueryParams, body: &[u8]) -> StatusCode {
        let variant = query.variant();
        let span = info_span!("webhook", request_id = %Uuid::new_v4(), %variant);
        async move {
            match self.run(variant, &query, body).await {
                Ok(()) => {
                    info!("request complete");
                    StatusCode::OK
                }
                Err(e) => {
                    let status = e.status_for(variant);
                    if matches!(e, RelayError::Connection { .. } | RelayError::Write { .. }) {
                        error!(error = %e, status = status.as_u16(), "request failed");
                    } else {
                        warn!(error = %e, status = status.as_u16(), "request rejected");
                    }
                    status
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, variant: Variant, query: &QueryParams, body: &[u8]) -> Result<(), RelayError> {
        if variant != Variant::Alert {
            query.authorize(&self.config.secret)?;
        }
        let plan = self.plan(variant, query, body)?;
        execute(&self.connector, &self.config.board_name, &plan).await
    }

    /// Validates the request and derives its writes.  Performs no I/O.
    pub fn plan(&self, variant: Variant, query: &QueryParams, body: &[u8]) -> Result<WritePlan, RelayError> {
        let (endpoint, commands) = match variant {
            Variant::Alert => {
                let alert = AlertPayload::parse(body)?;
                info!(summary = %alert.summary, state = %alert.state, "alert received");
                (self.config.alert_endpoint_id(), wiring::alert_commands(&alert))
            }
            Variant::Basic => {
                let endpoint = EndpointId::for_woop(query.woop_number(), &self.config.uri_suffix)?;
                let request = BasicRequest::from_query(query);
                (endpoint, wiring::basic_commands(request))
            }
            Variant::Color => {
                let endpoint = EndpointId::for_woop(query.woop_number(), &self.config.uri_suffix)?;
                let request = ColorRequest::parse(body)?;
                (endpoint, wiring::color_commands(&request))
            }
        };
        Ok(WritePlan {
            endpoint,
            pins: wiring::pins_for(variant),
            commands,
        })
    }
}

/// Connects, applies `plan`, and closes the session.
///
/// If the surrounding future is dropped mid-request, the session's own
/// `Drop` releases it instead.
///
/// # Errors
///
/// The first failing stage's [`RelayError`].  A failure to close is logged
/// and does not change the outcome.
pub async fn execute(connector: &Connector, board_name: &str, plan: &WritePlan) -> Result<(), RelayError> {
    let mut session = connector.connect(&plan.endpoint).await?;
    let outcome = apply_plan(session.as_mut(), board_name, plan).await;
    if let Err(e) = session.close().await {
        warn!(endpoint = %plan.endpoint, error = %e, "closing device session failed");
    }
    outcome
}

async fn apply_plan(
    session: &mut dyn DeviceSession,
    board_name: &str,
    plan: &WritePlan,
) -> Result<(), RelayError> {
    let board = session
        .board(board_name)
        .await
        .map_err(|source| RelayError::ComponentNotFound {
            name: board_name.to_string(),
            source,
        })?;

    let mut handles: HashMap<&PinName, PinHandle> = HashMap::with_capacity(plan.pins.len());
    for pin in plan.pins.iter().chain(plan.commands.iter().map(|c| &c.pin)) {
        if handles.contains_key(pin) {
            continue;
        }
        let handle = session
            .gpio_pin(board, pin)
            .await
            .map_err(|source| RelayError::ComponentNotFound {
                name: pin.to_string(),
                source,
            })?;
        handles.insert(pin, handle);
    }

    for command in &plan.commands {
        let handle = handles[&command.pin];
        apply_command(session, handle, command).await?;
        info!(%command, "pin written");
    }
    Ok(())
}

/// A PWM command attempts both the frequency and the duty write and reports
/// the first failure.
async fn apply_command(
    session: &mut dyn DeviceSession,
    pin: PinHandle,
    command: &PinCommand,
) -> Result<(), RelayError> {
    let result = match command.write {
        PinWrite::Digital(high) => session.set_gpio(pin, high).await,
        PinWrite::Pwm { frequency_hz, duty } => {
            let freq = session.set_pwm_frequency(pin, frequency_hz).await;
            let duty = session.set_pwm_duty(pin, duty).await;
            freq.and(duty)
        }
    };
    result.map_err(|source| RelayError::Write {
        command: command.to_string(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
