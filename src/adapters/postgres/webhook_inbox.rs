//! PostgreSQL implementation of WebhookInbox.
//!
//! The PRIMARY KEY on `event_id` makes duplicate deliveries
//! first-writer-wins under concurrency.

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{InboxRecord, InboxStatus, SaveOutcome, WebhookInbox};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the WebhookInbox port.
pub struct PostgresWebhookInbox {
    pool: PgPool,
}

impl PostgresWebhookInbox {
    /// Creates an inbox with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InboxRow {
    event_id: String,
    event_type: String,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<InboxRow> for InboxRecord {
    type Error = DomainError;

    fn try_from(row: InboxRow) -> Result<Self, Self::Error> {
        Ok(InboxRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            status: parse_inbox_status(&row.status)?,
            attempts: row.attempts.max(0) as u32,
            last_error: row.last_error,
            received_at: Timestamp::from_datetime(row.received_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_inbox_status(s: &str) -> Result<InboxStatus, DomainError> {
    match s {
        "received" => Ok(InboxStatus::Received),
        "processed" => Ok(InboxStatus::Processed),
        "ignored" => Ok(InboxStatus::Ignored),
        "failed" => Ok(InboxStatus::Failed),
        "dead" => Ok(InboxStatus::Dead),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid inbox status: {}", s),
        )),
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

const SELECT_COLUMNS: &str = r#"
    SELECT event_id, event_type, payload, status, attempts, last_error,
           received_at, processed_at
    FROM webhook_inbox
"#;

impl PostgresWebhookInbox {
    async fn set_status(
        &self,
        event_id: &str,
        status: &str,
        error: Option<&str>,
        stamp_processed: bool,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_inbox SET
                status = $2,
                attempts = attempts + 1,
                last_error = COALESCE($3, last_error),
                processed_at = CASE WHEN $4 THEN NOW() ELSE processed_at END
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(status)
        .bind(error)
        .bind(stamp_processed)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update inbox entry", e))?;
        Ok(())
    }
}

#[async_trait]
impl WebhookInbox for PostgresWebhookInbox {
    async fn save(&self, record: InboxRecord) -> Result<SaveOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_inbox (
                event_id, event_type, payload, status, attempts, last_error,
                received_at, processed_at
            ) VALUES ($1, $2, $3, 'received', 0, NULL, $4, NULL)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.received_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save inbox entry", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveOutcome::AlreadyExists)
        } else {
            Ok(SaveOutcome::Inserted)
        }
    }

    async fn find(&self, event_id: &str) -> Result<Option<InboxRecord>, DomainError> {
        let sql = format!("{} WHERE event_id = $1", SELECT_COLUMNS);
        let row: Option<InboxRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find inbox entry", e))?;

        row.map(InboxRecord::try_from).transpose()
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        self.set_status(event_id, "processed", None, true).await
    }

    async fn mark_ignored(&self, event_id: &str, reason: &str) -> Result<(), DomainError> {
        self.set_status(event_id, "ignored", Some(reason), true).await
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        self.set_status(event_id, "failed", Some(error), false).await
    }

    async fn mark_dead(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        self.set_status(event_id, "dead", Some(error), false).await
    }

    async fn due_for_redelivery(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<InboxRecord>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE status IN ('received', 'failed') AND attempts < $1
            ORDER BY received_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<InboxRow> = sqlx::query_as(&sql)
            .bind(max_attempts as i32)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to query redelivery candidates", e))?;

        rows.into_iter().map(InboxRecord::try_from).collect()
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_inbox WHERE received_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to prune inbox", e))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_status_strings_roundtrip() {
        for (s, status) in [
            ("received", InboxStatus::Received),
            ("processed", InboxStatus::Processed),
            ("ignored", InboxStatus::Ignored),
            ("failed", InboxStatus::Failed),
            ("dead", InboxStatus::Dead),
        ] {
            assert_eq!(parse_inbox_status(s).unwrap(), status);
        }
        assert!(parse_inbox_status("retrying").is_err());
    }
}
