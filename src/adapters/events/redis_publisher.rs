//! Redis pub/sub EventPublisher.
//!
//! Publishes envelopes as JSON on `{prefix}.{event_type}` channels so
//! collaborator services (feed access, chat access, notifications) can
//! subscribe to exactly the lifecycle changes they care about.

use crate::config::RedisConfig;
use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Publisher backed by Redis pub/sub.
pub struct RedisEventPublisher {
    client: redis::Client,
    channel_prefix: String,
}

impl RedisEventPublisher {
    /// Creates a publisher from Redis configuration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the URL cannot be parsed.
    pub fn new(config: &RedisConfig) -> Result<Self, DomainError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| DomainError::database(format!("Invalid Redis URL: {}", e)))?;
        Ok(Self {
            client,
            channel_prefix: config.channel_prefix.clone(),
        })
    }

    fn channel_for(&self, event_type: &str) -> String {
        format!("{}.{}", self.channel_prefix, event_type)
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| DomainError::database(format!("Failed to serialize event: {}", e)))?;
        let channel = self.channel_for(&event.event_type);

        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| DomainError::database(format!("Redis connection failed: {}", e)))?;

        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| DomainError::database(format!("Redis publish failed: {}", e)))?;
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            channel_prefix: "signaldesk.events".to_string(),
        }
    }

    #[test]
    fn channel_name_joins_prefix_and_type() {
        let publisher = RedisEventPublisher::new(&test_config()).unwrap();
        assert_eq!(
            publisher.channel_for("subscription.renewed.v1"),
            "signaldesk.events.subscription.renewed.v1"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            channel_prefix: "x".to_string(),
        };
        assert!(RedisEventPublisher::new(&config).is_err());
    }
}
