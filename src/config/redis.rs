//! Redis configuration (domain event pub/sub)

use serde::Deserialize;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Channel prefix for published domain events
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl RedisConfig {
    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        Ok(())
    }
}

fn default_channel_prefix() -> String {
    "signaldesk.events".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_url_passes() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
            channel_prefix: default_channel_prefix(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_redis_url_rejected() {
        let config = RedisConfig {
            url: "http://localhost".to_string(),
            channel_prefix: default_channel_prefix(),
        };
        assert!(config.validate().is_err());
    }
}
