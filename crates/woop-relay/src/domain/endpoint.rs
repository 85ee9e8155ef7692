//! Endpoint identifiers.

use std::fmt;

use crate::domain::error::RelayError;

const WOOP_PREFIX: &str = "woopwoop";
const MAIN_PART: &str = "-main.";
const ALERT_HOST: &str = "woop-woop-main.";

/// Network name of a device-hosting process, e.g.
/// `woopwoop7-main.xyz.viam.cloud`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    /// Builds the endpoint of woop number `number` under `suffix`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] unless `number` is a non-empty run
    /// of ASCII letters and digits.
    pub fn for_woop(number: &str, suffix: &str) -> Result<Self, RelayError> {
        if number.is_empty() {
            return Err(RelayError::Validation(
                "missing `woop` query parameter".to_string(),
            ));
        }
        if !number.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RelayError::Validation(format!(
                "woop number {number:?} must be ASCII letters and digits"
            )));
        }
        Ok(Self(format!("{WOOP_PREFIX}{number}{MAIN_PART}{suffix}")))
    }

    /// Endpoint the alert webhook drives when none is configured.
    pub fn alert(suffix: &str) -> Self {
        Self(format!("{ALERT_HOST}{suffix}"))
    }

    /// Wraps an endpoint name taken verbatim from configuration.
    pub fn configured(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Host part used for name resolution.
    pub fn host(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_woop_endpoint_concatenates_prefix_number_and_suffix() {
        let endpoint = EndpointId::for_woop("7", "xyz.viam.cloud").unwrap();
        assert_eq!(endpoint.to_string(), "woopwoop7-main.xyz.viam.cloud");
    }

    #[test]
    fn test_woop_endpoint_rejects_missing_number() {
        assert!(matches!(
            EndpointId::for_woop("", "xyz.viam.cloud"),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn test_woop_endpoint_rejects_host_injection() {
        assert!(EndpointId::for_woop("1.evil.example#", "xyz.viam.cloud").is_err());
        assert!(EndpointId::for_woop("3/..", "xyz.viam.cloud").is_err());
    }

    #[test]
    fn test_alert_endpoint_uses_fixed_host() {
        assert_eq!(
            EndpointId::alert("xyz.viam.cloud").host(),
            "woop-woop-main.xyz.viam.cloud"
        );
    }

    #[test]
    fn test_configured_endpoint_is_verbatim() {
        let endpoint = EndpointId::configured("woop-woop-main.abc.viam.cloud");
        assert_eq!(endpoint.host(), "woop-woop-main.abc.viam.cloud");
    }
}
