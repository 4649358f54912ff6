//! WebhookInbox port - durable store for inbound gateway events.
//!
//! Every verified delivery is persisted here *before* the gateway is
//! acknowledged, then processed asynchronously. This gives three
//! guarantees at once:
//!
//! - **Idempotency**: the primary key on the delivery id makes duplicate
//!   deliveries first-writer-wins.
//! - **Durability**: a crashed process never silently drops a financial
//!   event; the sweeper redrives `received`/`failed` entries.
//! - **Dead-lettering**: entries that keep failing are parked for manual
//!   reconciliation instead of retrying forever.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// Processing state of an inbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    /// Persisted and acknowledged, not yet processed.
    Received,
    /// Processed successfully; terminal.
    Processed,
    /// Intentionally skipped (unhandled event type); terminal.
    Ignored,
    /// Last processing attempt failed; eligible for redelivery.
    Failed,
    /// Redelivery budget exhausted; parked for manual reconciliation.
    Dead,
}

impl InboxStatus {
    /// Terminal entries are never redriven.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InboxStatus::Processed | InboxStatus::Ignored | InboxStatus::Dead
        )
    }
}

/// One inbound delivery, keyed by the gateway's delivery id.
#[derive(Debug, Clone)]
pub struct InboxRecord {
    /// Gateway delivery id (primary key).
    pub event_id: String,

    /// Event name (e.g. "subscription.charged").
    pub event_type: String,

    /// Raw event body for reprocessing and audit.
    pub payload: serde_json::Value,

    pub status: InboxStatus,

    /// Number of processing attempts so far.
    pub attempts: u32,

    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,

    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl InboxRecord {
    /// Creates a freshly-received entry.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload,
            status: InboxStatus::Received,
            attempts: 0,
            last_error: None,
            received_at: Timestamp::now(),
            processed_at: None,
        }
    }
}

/// Result of attempting to persist a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First time seeing this delivery id.
    Inserted,
    /// Duplicate delivery; an entry already exists.
    AlreadyExists,
}

/// Port for the durable webhook inbox.
///
/// Implementations must enforce uniqueness on `event_id` at the storage
/// layer (PRIMARY KEY) so concurrent duplicate deliveries race safely.
#[async_trait]
pub trait WebhookInbox: Send + Sync {
    /// Persist a delivery. `ON CONFLICT DO NOTHING` semantics.
    async fn save(&self, record: InboxRecord) -> Result<SaveOutcome, DomainError>;

    /// Look up a delivery by id.
    async fn find(&self, event_id: &str) -> Result<Option<InboxRecord>, DomainError>;

    /// Mark processed; increments the attempt counter.
    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError>;

    /// Mark intentionally ignored.
    async fn mark_ignored(&self, event_id: &str, reason: &str) -> Result<(), DomainError>;

    /// Mark failed; increments the attempt counter and records the error.
    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError>;

    /// Park the entry permanently.
    async fn mark_dead(&self, event_id: &str, error: &str) -> Result<(), DomainError>;

    /// Entries eligible for redelivery: `received` or `failed` with fewer
    /// than `max_attempts` attempts, oldest first.
    async fn due_for_redelivery(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<InboxRecord>, DomainError>;

    /// Retention cleanup. Returns the number of entries deleted.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}

#[async_trait]
impl<T: WebhookInbox + ?Sized> WebhookInbox for std::sync::Arc<T> {
    async fn save(&self, record: InboxRecord) -> Result<SaveOutcome, DomainError> {
        (**self).save(record).await
    }

    async fn find(&self, event_id: &str) -> Result<Option<InboxRecord>, DomainError> {
        (**self).find(event_id).await
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        (**self).mark_processed(event_id).await
    }

    async fn mark_ignored(&self, event_id: &str, reason: &str) -> Result<(), DomainError> {
        (**self).mark_ignored(event_id, reason).await
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        (**self).mark_failed(event_id, error).await
    }

    async fn mark_dead(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        (**self).mark_dead(event_id, error).await
    }

    async fn due_for_redelivery(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<InboxRecord>, DomainError> {
        (**self).due_for_redelivery(max_attempts, limit).await
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        (**self).delete_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_record_starts_unprocessed() {
        let record = InboxRecord::received(
            "evt_1",
            "subscription.charged",
            serde_json::json!({"event": "subscription.charged"}),
        );

        assert_eq!(record.status, InboxStatus::Received);
        assert_eq!(record.attempts, 0);
        assert!(record.last_error.is_none());
        assert!(record.processed_at.is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(InboxStatus::Processed.is_terminal());
        assert!(InboxStatus::Ignored.is_terminal());
        assert!(InboxStatus::Dead.is_terminal());
        assert!(!InboxStatus::Received.is_terminal());
        assert!(!InboxStatus::Failed.is_terminal());
    }

    #[test]
    fn webhook_inbox_is_object_safe() {
        fn _accepts_dyn(_inbox: &dyn WebhookInbox) {}
    }
}
