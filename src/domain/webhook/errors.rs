//! Webhook processing error types.
//!
//! Classifies everything that can go wrong between receiving a delivery
//! and committing its transition, with redelivery semantics for the
//! durable inbox.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Failed to parse the event body.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required entity missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The referenced subscription does not exist on the platform.
    ///
    /// Fatal: the platform never fabricates subscriptions from webhooks.
    /// Logged for manual reconciliation, not redriven.
    #[error("Subscription not found")]
    SubscriptionNotFound,

    /// The event implies a transition the state machine forbids.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Event acknowledged but intentionally not processed.
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Persistence failure; the inbox sweeper will redrive.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the inbox sweeper should redrive this event.
    ///
    /// Only transient infrastructure failures qualify. A missing
    /// subscription or invalid transition will fail identically on every
    /// attempt and goes to manual reconciliation instead.
    pub fn is_redrivable(&self) -> bool {
        matches!(self, WebhookError::Database(_))
    }

    /// Maps the error to the status returned to the gateway.
    ///
    /// Anything past authentication and parsing is acknowledged with 200:
    /// processing happens after the ack, and a non-2xx would only provoke
    /// the gateway's retry storm for an event already safely in the inbox.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::ParseError(_) | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,
            WebhookError::SubscriptionNotFound
            | WebhookError::InvalidTransition(_)
            | WebhookError::Ignored(_)
            | WebhookError::Database(_) => StatusCode::OK,
        }
    }
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        use crate::domain::foundation::ErrorCode;
        match err.code {
            ErrorCode::SubscriptionNotFound => WebhookError::SubscriptionNotFound,
            ErrorCode::InvalidStateTransition => WebhookError::InvalidTransition(err.message),
            _ => WebhookError::Database(err.message),
        }
    }
}
