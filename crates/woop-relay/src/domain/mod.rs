//! Domain layer for woop-relay.
//!
//! Pure types with no sockets, no runtime, and no environment reads.  The
//! binary builds a [`RelayConfig`] once at startup; everything else here is
//! recomputed per request.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod request;
pub mod wiring;

pub use config::{Credentials, RelayConfig};
pub use endpoint::EndpointId;
pub use error::{DeviceError, RelayError};
pub use request::{AlertPayload, BasicRequest, ColorRequest, ColorSetting, QueryParams, Variant};
