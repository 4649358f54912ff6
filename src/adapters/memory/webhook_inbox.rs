//! In-memory WebhookInbox for tests and local runs.

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{InboxRecord, InboxStatus, SaveOutcome, WebhookInbox};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// HashMap-backed inbox keyed by delivery id.
#[derive(Clone, Default)]
pub struct InMemoryWebhookInbox {
    records: Arc<Mutex<HashMap<String, InboxRecord>>>,
}

impl InMemoryWebhookInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of an entry, for assertions.
    pub fn status_of(&self, event_id: &str) -> Option<InboxStatus> {
        self.records
            .lock()
            .expect("lock poisoned")
            .get(event_id)
            .map(|r| r.status)
    }

    fn update<F: FnOnce(&mut InboxRecord)>(&self, event_id: &str, f: F) {
        let mut records = self.records.lock().expect("lock poisoned");
        if let Some(record) = records.get_mut(event_id) {
            f(record);
        }
    }
}

#[async_trait]
impl WebhookInbox for InMemoryWebhookInbox {
    async fn save(&self, record: InboxRecord) -> Result<SaveOutcome, DomainError> {
        let mut records = self.records.lock().expect("lock poisoned");
        if records.contains_key(&record.event_id) {
            Ok(SaveOutcome::AlreadyExists)
        } else {
            records.insert(record.event_id.clone(), record);
            Ok(SaveOutcome::Inserted)
        }
    }

    async fn find(&self, event_id: &str) -> Result<Option<InboxRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .expect("lock poisoned")
            .get(event_id)
            .cloned())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        self.update(event_id, |r| {
            r.status = InboxStatus::Processed;
            r.attempts += 1;
            r.processed_at = Some(Timestamp::now());
        });
        Ok(())
    }

    async fn mark_ignored(&self, event_id: &str, reason: &str) -> Result<(), DomainError> {
        self.update(event_id, |r| {
            r.status = InboxStatus::Ignored;
            r.attempts += 1;
            r.last_error = Some(reason.to_string());
            r.processed_at = Some(Timestamp::now());
        });
        Ok(())
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        self.update(event_id, |r| {
            r.status = InboxStatus::Failed;
            r.attempts += 1;
            r.last_error = Some(error.to_string());
        });
        Ok(())
    }

    async fn mark_dead(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        self.update(event_id, |r| {
            r.status = InboxStatus::Dead;
            r.attempts += 1;
            r.last_error = Some(error.to_string());
        });
        Ok(())
    }

    async fn due_for_redelivery(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<InboxRecord>, DomainError> {
        let records = self.records.lock().expect("lock poisoned");
        let mut due: Vec<_> = records
            .values()
            .filter(|r| !r.status.is_terminal() && r.attempts < max_attempts)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.lock().expect("lock poisoned");
        let before = records.len();
        records.retain(|_, r| !r.received_at.is_before(&cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> InboxRecord {
        InboxRecord::received(id, "subscription.charged", serde_json::json!({}))
    }

    #[tokio::test]
    async fn save_deduplicates_on_delivery_id() {
        let inbox = InMemoryWebhookInbox::new();

        assert_eq!(inbox.save(record("evt_1")).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(
            inbox.save(record("evt_1")).await.unwrap(),
            SaveOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn mark_failed_increments_attempts() {
        let inbox = InMemoryWebhookInbox::new();
        inbox.save(record("evt_1")).await.unwrap();

        inbox.mark_failed("evt_1", "db down").await.unwrap();
        inbox.mark_failed("evt_1", "db still down").await.unwrap();

        let found = inbox.find("evt_1").await.unwrap().unwrap();
        assert_eq!(found.attempts, 2);
        assert_eq!(found.status, InboxStatus::Failed);
        assert_eq!(found.last_error.as_deref(), Some("db still down"));
    }

    #[tokio::test]
    async fn redelivery_excludes_terminal_and_exhausted() {
        let inbox = InMemoryWebhookInbox::new();

        inbox.save(record("evt_fresh")).await.unwrap();

        inbox.save(record("evt_done")).await.unwrap();
        inbox.mark_processed("evt_done").await.unwrap();

        inbox.save(record("evt_spent")).await.unwrap();
        for _ in 0..5 {
            inbox.mark_failed("evt_spent", "boom").await.unwrap();
        }

        let due = inbox.due_for_redelivery(5, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, "evt_fresh");
    }

    #[tokio::test]
    async fn delete_before_prunes_old_entries() {
        let inbox = InMemoryWebhookInbox::new();
        let mut old = record("evt_old");
        old.received_at = Timestamp::now().minus_days(60);
        inbox.save(old).await.unwrap();
        inbox.save(record("evt_new")).await.unwrap();

        let deleted = inbox
            .delete_before(Timestamp::now().minus_days(30))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(inbox.find("evt_old").await.unwrap().is_none());
        assert!(inbox.find("evt_new").await.unwrap().is_some());
    }
}
