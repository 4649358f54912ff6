//! Inbound event pipeline - durable, idempotent webhook intake.
//!
//! Coordinates the webhook inbox and the event router so every delivery
//! is processed exactly once:
//!
//! 1. `accept` persists the delivery before the gateway is acknowledged;
//!    a duplicate delivery id is a no-op
//! 2. `process` dispatches to the handler and records the outcome
//! 3. the scheduler redrives `received`/`failed` entries and dead-letters
//!    them once the attempt budget is spent
//!
//! ## Race Condition Handling
//!
//! When duplicate deliveries arrive simultaneously, the inbox primary key
//! decides: first to insert wins, the others observe `AlreadyExists` and
//! acknowledge without processing.

use async_trait::async_trait;

use crate::ports::{InboxRecord, SaveOutcome, WebhookInbox};

use super::{GatewayEvent, WebhookError};

/// Default processing attempts before an entry is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Routes a verified gateway event to its domain transition.
///
/// Returns `Ok(())` on success, `Err(WebhookError::Ignored(_))` for events
/// that should be acknowledged without processing, and other `Err`
/// variants for real failures.
#[async_trait]
pub trait GatewayEventHandler: Send + Sync {
    async fn handle(&self, event: &GatewayEvent) -> Result<(), WebhookError>;
}

#[async_trait]
impl<T: GatewayEventHandler + ?Sized> GatewayEventHandler for std::sync::Arc<T> {
    async fn handle(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        (**self).handle(event).await
    }
}

/// Outcome of persisting a delivery at the acknowledgment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// First time seeing this delivery; caller should process it.
    Accepted,
    /// Duplicate delivery; acknowledge and do nothing.
    AlreadySeen,
}

/// Outcome of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    Processed,
    Ignored { reason: String },
    /// Attempt failed; entry stays eligible for redelivery.
    Failed { error: String },
    /// Attempt failed and the entry was parked for manual reconciliation.
    DeadLettered { error: String },
}

/// Durable intake pipeline for gateway webhooks.
pub struct InboundEventPipeline<I: WebhookInbox, H: GatewayEventHandler> {
    inbox: I,
    handler: H,
    max_attempts: u32,
}

impl<I: WebhookInbox, H: GatewayEventHandler> InboundEventPipeline<I, H> {
    pub fn new(inbox: I, handler: H) -> Self {
        Self {
            inbox,
            handler,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Persist a delivery before acknowledging the gateway.
    ///
    /// Must complete before the HTTP 200 goes out: once acknowledged, the
    /// gateway will not redeliver, so the inbox row is the only durable
    /// copy of the event.
    pub async fn accept(&self, event: &GatewayEvent) -> Result<AcceptOutcome, WebhookError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| WebhookError::ParseError(format!("failed to serialize event: {}", e)))?;
        let record = InboxRecord::received(&event.id, &event.event, payload);

        match self.inbox.save(record).await? {
            SaveOutcome::Inserted => Ok(AcceptOutcome::Accepted),
            SaveOutcome::AlreadyExists => Ok(AcceptOutcome::AlreadySeen),
        }
    }

    /// Run one processing attempt for an accepted delivery.
    pub async fn process(&self, event: &GatewayEvent) -> Result<ProcessResult, WebhookError> {
        match self.handler.handle(event).await {
            Ok(()) => {
                self.inbox.mark_processed(&event.id).await?;
                Ok(ProcessResult::Processed)
            }
            Err(WebhookError::Ignored(reason)) => {
                self.inbox.mark_ignored(&event.id, &reason).await?;
                Ok(ProcessResult::Ignored { reason })
            }
            Err(err) if err.is_redrivable() => {
                let error = err.to_string();
                let attempts = self
                    .inbox
                    .find(&event.id)
                    .await?
                    .map(|r| r.attempts)
                    .unwrap_or(0);

                if attempts + 1 >= self.max_attempts {
                    self.inbox.mark_dead(&event.id, &error).await?;
                    Ok(ProcessResult::DeadLettered { error })
                } else {
                    self.inbox.mark_failed(&event.id, &error).await?;
                    Ok(ProcessResult::Failed { error })
                }
            }
            Err(err) => {
                // Deterministic failures redeliver identically; park them
                let error = err.to_string();
                self.inbox.mark_dead(&event.id, &error).await?;
                Ok(ProcessResult::DeadLettered { error })
            }
        }
    }

    /// Redrive a stored entry (scheduler path).
    pub async fn redeliver(&self, record: &InboxRecord) -> Result<ProcessResult, WebhookError> {
        if record.status.is_terminal() {
            return Ok(ProcessResult::Ignored {
                reason: "entry already terminal".to_string(),
            });
        }

        let event: GatewayEvent = serde_json::from_value(record.payload.clone())
            .map_err(|e| WebhookError::ParseError(format!("stored payload unreadable: {}", e)))?;
        self.process(&event).await
    }

    /// Entries the scheduler should redrive this sweep.
    pub async fn due_for_redelivery(&self, limit: u32) -> Result<Vec<InboxRecord>, WebhookError> {
        Ok(self
            .inbox
            .due_for_redelivery(self.max_attempts, limit)
            .await?)
    }
}
