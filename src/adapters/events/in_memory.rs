//! In-memory EventPublisher.
//!
//! Collects published envelopes for inspection. Used in tests and as the
//! default publisher when Redis is not configured.

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Publisher that appends every envelope to an in-process buffer.
#[derive(Clone, Default)]
pub struct InMemoryEventPublisher {
    published: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().expect("lock poisoned").clone()
    }

    /// Event type strings published so far, in order.
    pub fn published_types(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.published.lock().expect("lock poisoned").push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        let mut published = self.published.lock().expect("lock poisoned");
        published.extend(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_collects_in_order() {
        let publisher = InMemoryEventPublisher::new();

        publisher
            .publish(EventEnvelope::new(
                "subscription.activated.v1",
                "sub-1",
                "Subscription",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        publisher
            .publish(EventEnvelope::new(
                "subscription.renewed.v1",
                "sub-1",
                "Subscription",
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(
            publisher.published_types(),
            vec!["subscription.activated.v1", "subscription.renewed.v1"]
        );
    }

    #[tokio::test]
    async fn publish_all_appends_batch() {
        let publisher = InMemoryEventPublisher::new();
        publisher
            .publish_all(vec![
                EventEnvelope::test_fixture(),
                EventEnvelope::test_fixture(),
            ])
            .await
            .unwrap();

        assert_eq!(publisher.published().len(), 2);
    }
}
