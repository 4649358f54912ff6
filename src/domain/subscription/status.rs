//! Subscription status state machine.
//!
//! Defines all possible subscription states and valid transitions
//! through the billing lifecycle.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Subscription lifecycle status.
///
/// This is the state enum surfaced to collaborators (feed-access and
/// chat-access checks read it directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Initial state: checkout created, first charge not yet captured.
    /// No access until the gateway confirms payment.
    PendingPayment,

    /// Paid and current. Full access.
    Active,

    /// Payment failed (grace period running) or explicitly paused.
    Suspended,

    /// Trader or gateway cancelled. Terminal; resubscribing creates a
    /// new row.
    Cancelled,

    /// Billing cycle completed with no renewal. Terminal.
    Expired,
}

impl SubscriptionStatus {
    /// Returns true if this status grants access to the analyst's content.
    pub fn has_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Returns the wire representation used in persistence and APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::PendingPayment => "pending_payment",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING_PAYMENT
            (PendingPayment, Active)
                | (PendingPayment, Cancelled)
                | (PendingPayment, Expired)
            // From ACTIVE
                | (Active, Active) // Renewal extends in place
                | (Active, Suspended)
                | (Active, Cancelled)
                | (Active, Expired)
            // From SUSPENDED
                | (Suspended, Active)
                | (Suspended, Cancelled)
                | (Suspended, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            PendingPayment => vec![Active, Cancelled, Expired],
            Active => vec![Active, Suspended, Cancelled, Expired],
            Suspended => vec![Active, Cancelled, Expired],
            Cancelled => vec![],
            Expired => vec![],
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
