//! Per-connection session state machine.
//!
//! [`DeviceSessionHandler`] consumes one decoded request at a time and says
//! what to send back through a [`Step`].  It owns no socket, so every rule
//! below is testable without the network:
//!
//! - the first message must be a HELLO naming this agent's endpoint with the
//!   right API key, otherwise the session is refused and closed;
//! - unknown boards and pins answer `NotFound`;
//! - out-of-range duty cycles answer `InvalidArgument`;
//! - driver failures answer `HardwareFault`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use woop_core::domain::pin::validate_duty;
use woop_core::protocol::messages::{
    DeviceErrorCode, ErrorMessage, HelloAckMessage, HelloMessage, RejectReason,
};
use woop_core::{DeviceMessage, PinName};

use crate::domain::{AgentIdentity, BoardLayout, BOARD_HANDLE};

/// Error type for pin driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("hardware fault on pin {pin}: {reason}")]
    Hardware { pin: PinName, reason: String },
    #[error("driver unavailable: {0}")]
    Unavailable(String),
}

/// Hardware-facing pin writes.
///
/// Infrastructure implementations drive real GPIO or record state; tests
/// use the recording mock.
pub trait PinDriver: Send + Sync {
    fn set_digital(&self, pin: &PinName, high: bool) -> Result<(), DriverError>;

    fn set_pwm_frequency(&self, pin: &PinName, frequency_hz: u32) -> Result<(), DriverError>;

    /// `duty` has already been checked to lie in `0.0..=1.0`.
    fn set_pwm_duty(&self, pin: &PinName, duty: f64) -> Result<(), DriverError>;
}

/// What the connection task does after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send the reply and keep reading.
    Reply(DeviceMessage),
    /// Send the reply, then close.
    ReplyAndClose(DeviceMessage),
    /// Close without replying.
    Close,
}

/// State of one relay session.
pub struct DeviceSessionHandler {
    identity: Arc<AgentIdentity>,
    layout: Arc<BoardLayout>,
    driver: Arc<dyn PinDriver>,
    authenticated: bool,
}

impl DeviceSessionHandler {
    pub fn new(
        identity: Arc<AgentIdentity>,
        layout: Arc<BoardLayout>,
        driver: Arc<dyn PinDriver>,
    ) -> Self {
        Self {
            identity,
            layout,
            driver,
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Handles one request.
    pub fn handle(&mut self, message: DeviceMessage) -> Step {
        if let DeviceMessage::Close = message {
            debug!("relay closed the session");
            return Step::Close;
        }
        if !self.authenticated {
            return match message {
                DeviceMessage::Hello(hello) => self.handle_hello(&hello),
                other => {
                    warn!(kind = ?other.message_type(), "request before HELLO");
                    Step::ReplyAndClose(error(
                        DeviceErrorCode::NotAuthenticated,
                        "session not authenticated",
                    ))
                }
            };
        }

        let reply = match message {
            DeviceMessage::ResolveBoard { name } => self.resolve_board(&name),
            DeviceMessage::ResolvePin { board, name } => self.resolve_pin(board, &name),
            DeviceMessage::SetGpio { pin, high } => self.write(pin, |driver, name| {
                driver.set_digital(name, high)
            }),
            DeviceMessage::SetPwmFrequency { pin, frequency_hz } => {
                self.write(pin, |driver, name| driver.set_pwm_frequency(name, frequency_hz))
            }
            DeviceMessage::SetPwmDuty { pin, duty } => match validate_duty(duty) {
                Ok(()) => self.write(pin, |driver, name| driver.set_pwm_duty(name, duty)),
                Err(e) => error(DeviceErrorCode::InvalidArgument, &e.to_string()),
            },
            DeviceMessage::Hello(_) => {
                error(DeviceErrorCode::InvalidArgument, "session already open")
            }
            other => error(
                DeviceErrorCode::InvalidArgument,
                &format!("{:?} is not a request", other.message_type()),
            ),
        };
        Step::Reply(reply)
    }

    fn handle_hello(&mut self, hello: &HelloMessage) -> Step {
        let reason = if hello.endpoint != self.identity.endpoint {
            RejectReason::UnknownEndpoint
        } else if hello.api_key_id != self.identity.api_key_id
            || hello.api_key != self.identity.api_key
        {
            RejectReason::BadCredentials
        } else {
            RejectReason::None
        };

        if reason != RejectReason::None {
            warn!(endpoint = %hello.endpoint, %reason, "session refused");
            return Step::ReplyAndClose(reject(reason));
        }
        self.authenticated = true;
        info!(
            endpoint = %hello.endpoint,
            api_key_id = %hello.api_key_id,
            flags = hello.session_flags,
            "session accepted"
        );
        Step::Reply(DeviceMessage::HelloAck(HelloAckMessage {
            accepted: true,
            reject_reason: RejectReason::None,
        }))
    }

    fn resolve_board(&self, name: &str) -> DeviceMessage {
        if name == self.layout.name {
            DeviceMessage::BoardResolved {
                handle: BOARD_HANDLE,
            }
        } else {
            error(DeviceErrorCode::NotFound, &format!("no board named {name:?}"))
        }
    }

    fn resolve_pin(&self, board: u32, name: &str) -> DeviceMessage {
        if board != BOARD_HANDLE {
            return error(DeviceErrorCode::NotFound, &format!("no board with handle {board}"));
        }
        match self.layout.pin_handle(name) {
            Some(handle) => DeviceMessage::PinResolved { handle },
            None => error(DeviceErrorCode::NotFound, &format!("no pin named {name:?}")),
        }
    }

    fn write<F>(&self, handle: u32, op: F) -> DeviceMessage
    where
        F: FnOnce(&dyn PinDriver, &PinName) -> Result<(), DriverError>,
    {
        let Some(pin) = self.layout.pin_by_handle(handle) else {
            return error(DeviceErrorCode::NotFound, &format!("no pin with handle {handle}"));
        };
        match op(self.driver.as_ref(), pin) {
            Ok(()) => DeviceMessage::Ack,
            Err(e) => {
                warn!(%pin, error = %e, "pin write failed");
                error(DeviceErrorCode::HardwareFault, &e.to_string())
            }
        }
    }
}

/// Rejecting HELLO_ACK.
pub fn reject(reason: RejectReason) -> DeviceMessage {
    DeviceMessage::HelloAck(HelloAckMessage {
        accepted: false,
        reject_reason: reason,
    })
}

fn error(code: DeviceErrorCode, description: &str) -> DeviceMessage {
    DeviceMessage::Error(ErrorMessage {
        code,
        description: description.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pin_driver::mock::{DriverCall, MockPinDriver};

    fn identity() -> Arc<AgentIdentity> {
        Arc::new(AgentIdentity {
            endpoint: "woopwoop1-main.test".to_string(),
            api_key_id: "id".to_string(),
            api_key: "key".to_string(),
        })
    }

    fn hello(endpoint: &str, key: &str) -> DeviceMessage {
        DeviceMessage::Hello(HelloMessage {
            endpoint: endpoint.to_string(),
            api_key_id: "id".to_string(),
            api_key: key.to_string(),
            session_flags: 0,
        })
    }

    fn handler_with(driver: Arc<MockPinDriver>) -> DeviceSessionHandler {
        DeviceSessionHandler::new(identity(), Arc::new(BoardLayout::default()), driver)
    }

    fn open_handler(driver: Arc<MockPinDriver>) -> DeviceSessionHandler {
        let mut handler = handler_with(driver);
        assert!(matches!(
            handler.handle(hello("woopwoop1-main.test", "key")),
            Step::Reply(DeviceMessage::HelloAck(HelloAckMessage { accepted: true, .. }))
        ));
        handler
    }

    fn error_code(step: &Step) -> Option<DeviceErrorCode> {
        match step {
            Step::Reply(DeviceMessage::Error(e)) | Step::ReplyAndClose(DeviceMessage::Error(e)) => {
                Some(e.code)
            }
            _ => None,
        }
    }

    fn pin_handle(handler: &mut DeviceSessionHandler, name: &str) -> u32 {
        match handler.handle(DeviceMessage::ResolvePin {
            board: BOARD_HANDLE,
            name: name.to_string(),
        }) {
            Step::Reply(DeviceMessage::PinResolved { handle }) => handle,
            other => panic!("expected PinResolved, got {other:?}"),
        }
    }

    // ── Handshake ─────────────────────────────────────────────────────────

    #[test]
    fn test_valid_hello_is_accepted() {
        let handler = open_handler(Arc::new(MockPinDriver::new()));
        assert!(handler.is_authenticated());
    }

    #[test]
    fn test_wrong_key_is_rejected_and_closed() {
        let mut handler = handler_with(Arc::new(MockPinDriver::new()));

        let step = handler.handle(hello("woopwoop1-main.test", "wrong"));

        assert_eq!(step, Step::ReplyAndClose(reject(RejectReason::BadCredentials)));
        assert!(!handler.is_authenticated());
    }

    #[test]
    fn test_wrong_endpoint_is_rejected() {
        let mut handler = handler_with(Arc::new(MockPinDriver::new()));

        let step = handler.handle(hello("woopwoop2-main.test", "key"));

        assert_eq!(step, Step::ReplyAndClose(reject(RejectReason::UnknownEndpoint)));
    }

    #[test]
    fn test_request_before_hello_is_not_authenticated() {
        // Arrange
        let driver = Arc::new(MockPinDriver::new());
        let mut handler = handler_with(Arc::clone(&driver));

        // Act
        let step = handler.handle(DeviceMessage::SetGpio { pin: 1, high: true });

        // Assert
        assert!(matches!(step, Step::ReplyAndClose(_)));
        assert_eq!(error_code(&step), Some(DeviceErrorCode::NotAuthenticated));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_close_ends_session_without_reply() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));
        assert_eq!(handler.handle(DeviceMessage::Close), Step::Close);
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    #[test]
    fn test_board_lookup() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));

        assert_eq!(
            handler.handle(DeviceMessage::ResolveBoard { name: "board".to_string() }),
            Step::Reply(DeviceMessage::BoardResolved { handle: BOARD_HANDLE })
        );
        let missing = handler.handle(DeviceMessage::ResolveBoard { name: "other".to_string() });
        assert_eq!(error_code(&missing), Some(DeviceErrorCode::NotFound));
    }

    #[test]
    fn test_unknown_pin_is_not_found() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));

        let step = handler.handle(DeviceMessage::ResolvePin {
            board: BOARD_HANDLE,
            name: "99".to_string(),
        });

        assert_eq!(error_code(&step), Some(DeviceErrorCode::NotFound));
    }

    #[test]
    fn test_pin_on_unknown_board_handle_is_not_found() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));

        let step = handler.handle(DeviceMessage::ResolvePin {
            board: 7,
            name: "12".to_string(),
        });

        assert_eq!(error_code(&step), Some(DeviceErrorCode::NotFound));
    }

    // ── Writes ────────────────────────────────────────────────────────────

    #[test]
    fn test_gpio_and_pwm_writes_reach_driver_in_order() {
        // Arrange
        let driver = Arc::new(MockPinDriver::new());
        let mut handler = open_handler(Arc::clone(&driver));
        let strobe = pin_handle(&mut handler, "12");
        let red = pin_handle(&mut handler, "19");

        // Act
        let steps = [
            handler.handle(DeviceMessage::SetGpio { pin: strobe, high: true }),
            handler.handle(DeviceMessage::SetPwmFrequency { pin: red, frequency_hz: 500 }),
            handler.handle(DeviceMessage::SetPwmDuty { pin: red, duty: 0.5 }),
        ];

        // Assert
        for step in &steps {
            assert_eq!(*step, Step::Reply(DeviceMessage::Ack));
        }
        assert_eq!(
            driver.calls(),
            [
                DriverCall::Digital(PinName::from_static("12"), true),
                DriverCall::PwmFrequency(PinName::from_static("19"), 500),
                DriverCall::PwmDuty(PinName::from_static("19"), 0.5),
            ]
        );
    }

    #[test]
    fn test_out_of_range_duty_is_invalid_argument() {
        let driver = Arc::new(MockPinDriver::new());
        let mut handler = open_handler(Arc::clone(&driver));
        let red = pin_handle(&mut handler, "19");

        let step = handler.handle(DeviceMessage::SetPwmDuty { pin: red, duty: 1.5 });

        assert_eq!(error_code(&step), Some(DeviceErrorCode::InvalidArgument));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_driver_failure_is_hardware_fault() {
        let driver = Arc::new(MockPinDriver::failing_on(["14"]));
        let mut handler = open_handler(Arc::clone(&driver));
        let buzzer = pin_handle(&mut handler, "14");

        let step = handler.handle(DeviceMessage::SetGpio { pin: buzzer, high: true });

        assert_eq!(error_code(&step), Some(DeviceErrorCode::HardwareFault));
    }

    #[test]
    fn test_write_to_unknown_handle_is_not_found() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));

        let step = handler.handle(DeviceMessage::SetGpio { pin: 42, high: true });

        assert_eq!(error_code(&step), Some(DeviceErrorCode::NotFound));
    }

    #[test]
    fn test_reply_type_message_is_invalid_argument() {
        let mut handler = open_handler(Arc::new(MockPinDriver::new()));

        let step = handler.handle(DeviceMessage::Ack);

        assert_eq!(error_code(&step), Some(DeviceErrorCode::InvalidArgument));
    }
}
