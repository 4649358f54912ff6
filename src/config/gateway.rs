//! Payment gateway configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Public API key id
    pub key_id: String,

    /// API key secret; also signs browser-redirect checkout confirmations
    pub key_secret: Secret<String>,

    /// Webhook signing secret
    pub webhook_secret: Secret<String>,

    /// Per-request timeout in seconds. Kept short: a timed-out call is
    /// "outcome unknown" and reconciled by webhook or sweep.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Exposed key secret for signing/verification
    pub fn key_secret(&self) -> &str {
        self.key_secret.expose_secret()
    }

    /// Exposed webhook secret for signature verification
    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.expose_secret()
    }

    /// Check if using the gateway's test mode
    pub fn is_test_mode(&self) -> bool {
        self.key_id.starts_with("rzp_test_")
    }

    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key_id.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_KEY_ID"));
        }
        if self.key_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_KEY_SECRET"));
        }
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_WEBHOOK_SECRET"));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 30 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    5
}
