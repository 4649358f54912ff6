//! Error type surfaced by subscription command handlers.

use crate::domain::foundation::{DomainError, ErrorCode};
use thiserror::Error;

/// Errors returned to synchronous callers of subscription operations.
///
/// Validation failures carry specific, user-facing reasons; infrastructure
/// failures are opaque.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Webhook signature verification failed.
    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    /// Checkout confirmation signature verification failed.
    #[error("Invalid checkout signature")]
    InvalidCheckoutSignature,

    /// Referenced subscription does not exist.
    #[error("Subscription not found")]
    NotFound,

    /// Referenced tier does not exist.
    #[error("Tier not found")]
    TierNotFound,

    /// The (trader, analyst) pair already has an active subscription.
    #[error("An active subscription with this analyst already exists")]
    AlreadySubscribed,

    /// The tier has reached its subscriber capacity.
    #[error("This tier is not accepting new subscribers")]
    TierFull,

    /// Discount code rejected, with a user-facing reason.
    #[error("{0}")]
    DiscountRejected(String),

    /// The requested transition is not valid from the current state.
    #[error("Invalid state ({current}): {reason}")]
    InvalidState { current: String, reason: String },

    /// The gateway rejected the request.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The gateway call timed out; the outcome is unknown and will be
    /// reconciled by the next webhook or scheduler sweep.
    #[error("Payment gateway timed out; outcome unknown")]
    GatewayOutcomeUnknown,

    /// Persistence or other infrastructure failure.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl SubscriptionError {
    /// Creates an invalid-state error from the current status and a reason.
    pub fn invalid_state(current: impl Into<String>, reason: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current: current.into(),
            reason: reason.into(),
        }
    }

    /// Creates an infrastructure error.
    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::SubscriptionNotFound => SubscriptionError::NotFound,
            ErrorCode::TierNotFound => SubscriptionError::TierNotFound,
            ErrorCode::DuplicateSubscription => SubscriptionError::AlreadySubscribed,
            ErrorCode::TierFull => SubscriptionError::TierFull,
            ErrorCode::InvalidStateTransition => SubscriptionError::InvalidState {
                current: "unknown".to_string(),
                reason: err.message,
            },
            _ => SubscriptionError::Infrastructure(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_rejection_displays_reason_verbatim() {
        let err = SubscriptionError::DiscountRejected(
            "This code is only valid for first-time subscribers".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "This code is only valid for first-time subscribers"
        );
    }

    #[test]
    fn invalid_state_includes_current_status() {
        let err = SubscriptionError::invalid_state("suspended", "cannot change tier");
        assert_eq!(err.to_string(), "Invalid state (suspended): cannot change tier");
    }

    #[test]
    fn domain_not_found_maps_to_not_found() {
        let domain = DomainError::new(ErrorCode::SubscriptionNotFound, "missing");
        let err: SubscriptionError = domain.into();
        assert!(matches!(err, SubscriptionError::NotFound));
    }

    #[test]
    fn domain_database_error_maps_to_infrastructure() {
        let domain = DomainError::database("connection refused");
        let err: SubscriptionError = domain.into();
        assert!(matches!(err, SubscriptionError::Infrastructure(_)));
    }
}
