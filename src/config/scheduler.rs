//! Billing scheduler configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Billing sweeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Hours since the last attempt before a failed payment is retried
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_hours: u64,

    /// Max subscriptions touched per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Max inbox entries redriven per sweep
    #[serde(default = "default_redelivery_batch")]
    pub redelivery_batch_size: u32,
}

impl SchedulerConfig {
    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate scheduler configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            retry_backoff_hours: default_retry_backoff(),
            batch_size: default_batch_size(),
            redelivery_batch_size: default_redelivery_batch(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_retry_backoff() -> u64 {
    24
}

fn default_batch_size() -> u32 {
    100
}

fn default_redelivery_batch() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sweep_every_five_minutes() {
        let config = SchedulerConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.retry_backoff_hours, 24);
    }

    #[test]
    fn zero_interval_rejected() {
        let config = SchedulerConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
