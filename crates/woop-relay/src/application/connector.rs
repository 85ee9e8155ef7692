//! Connector: opens an authenticated device session with bounded retry.
//!
//! The connector never talks to sockets itself.  It drives a [`DeviceDialer`]
//! (TCP in production, mocks in tests) and applies the retry policy:
//!
//! - every attempt is bounded by [`RetryPolicy::attempt_timeout`];
//! - the wait before attempt *i* (0-indexed) is `i × backoff_unit`, so
//!   attempt 0 is immediate and five attempts sleep 0+1+2+3+4 units in total;
//! - when every attempt fails the last error is returned inside
//!   [`RelayError::Connection`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use woop_core::protocol::messages::session_flags;
use woop_core::PinName;

use crate::domain::{Credentials, DeviceError, EndpointId, RelayConfig, RelayError};

/// Device-side handle of a resolved board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardHandle(pub u32);

/// Device-side handle of a resolved GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinHandle(pub u32);

/// Behaviour requested for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub reconnect: bool,
    pub liveness_checks: bool,
    pub credential_refresh: bool,
}

impl SessionOptions {
    /// Short-lived, one-request session: no reconnection, no liveness
    /// checks, no credential refresh.
    pub fn single_use() -> Self {
        Self {
            reconnect: false,
            liveness_checks: false,
            credential_refresh: false,
        }
    }

    /// Wire encoding of these options.
    pub fn session_flags(&self) -> u32 {
        let mut flags = 0;
        if !self.reconnect {
            flags |= session_flags::NO_RECONNECT;
        }
        if !self.liveness_checks {
            flags |= session_flags::NO_LIVENESS_CHECK;
        }
        if !self.credential_refresh {
            flags |= session_flags::NO_CREDENTIAL_REFRESH;
        }
        flags
    }
}

/// Opens sessions to device endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDialer: Send + Sync {
    /// Performs one connection attempt (dial and handshake).
    async fn dial(
        &self,
        endpoint: &EndpointId,
        credentials: &Credentials,
        options: &SessionOptions,
    ) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

/// An open, authenticated session.  Exclusively owned by one request.
#[async_trait]
pub trait DeviceSession: Send {
    /// Looks up a board component by name.
    async fn board(&mut self, name: &str) -> Result<BoardHandle, DeviceError>;

    /// Looks up a GPIO pin on `board`.
    async fn gpio_pin(&mut self, board: BoardHandle, name: &PinName)
        -> Result<PinHandle, DeviceError>;

    async fn set_gpio(&mut self, pin: PinHandle, high: bool) -> Result<(), DeviceError>;

    async fn set_pwm_frequency(&mut self, pin: PinHandle, frequency_hz: u32)
        -> Result<(), DeviceError>;

    async fn set_pwm_duty(&mut self, pin: PinHandle, duty: f64) -> Result<(), DeviceError>;

    /// Ends the session.  Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Attempt count, per-attempt bound and backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_connect_attempts,
            attempt_timeout: config.connect_timeout,
            backoff_unit: config.backoff_unit,
        }
    }

    /// Wait before 0-indexed attempt `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Opens sessions with retry.
pub struct Connector {
    dialer: Arc<dyn DeviceDialer>,
    credentials: Credentials,
    policy: RetryPolicy,
}

impl Connector {
    pub fn new(dialer: Arc<dyn DeviceDialer>, credentials: Credentials, policy: RetryPolicy) -> Self {
        Self {
            dialer,
            credentials,
            policy,
        }
    }

    /// Returns the first session that opens within the policy.
    ///
    /// # Errors
    ///
    /// [`RelayError::Connection`] carrying the last attempt's error once
    /// `max_attempts` attempts (at least one) have failed.
    pub async fn connect(&self, endpoint: &EndpointId) -> Result<Box<dyn DeviceSession>, RelayError> {
        let attempts = self.policy.max_attempts.max(1);
        let options = SessionOptions::single_use();
        let mut last_error = DeviceError::Closed;

        for attempt in 0..attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            info!(%endpoint, attempt = attempt + 1, of = attempts, "connecting to device");
            let dial = self.dialer.dial(endpoint, &self.credentials, &options);
            match tokio::time::timeout(self.policy.attempt_timeout, dial).await {
                Ok(Ok(session)) => {
                    debug!(%endpoint, attempt = attempt + 1, "device session open");
                    return Ok(session);
                }
                Ok(Err(e)) => {
                    debug!(%endpoint, attempt = attempt + 1, error = %e, "connection attempt failed");
                    last_error = e;
                }
                Err(_) => {
                    debug!(%endpoint, attempt = attempt + 1, "connection attempt timed out");
                    last_error = DeviceError::Timeout(self.policy.attempt_timeout);
                }
            }
        }

        warn!(%endpoint, attempts, error = %last_error, "giving up on device");
        Err(RelayError::Connection {
            endpoint: endpoint.to_string(),
            attempts,
            source: last_error,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
