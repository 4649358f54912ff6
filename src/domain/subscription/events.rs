//! Subscription lifecycle domain events.
//!
//! Every state transition publishes exactly one event. Collaborators
//! (feed access, chat access, notifications) consume these instead of
//! polling subscription rows.

use crate::domain::foundation::{
    AnalystId, DomainEvent, EventId, SubscriptionId, TierId, Timestamp, TraderId,
};
use serde::{Deserialize, Serialize};

/// Why a subscription was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionReason {
    /// Three consecutive charge failures.
    RetriesExhausted,
    /// Trader-requested pause.
    Paused,
}

/// Why a subscription reached a terminal state without renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// Gateway reported the final cycle completed.
    CycleCompleted,
    /// The expiry sweep found `expires_at` in the past with no renewal.
    RenewalMissed,
    /// The 7-day grace window lapsed while suspended.
    GraceElapsed,
}

/// Domain events emitted by the subscription aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Activated {
        event_id: EventId,
        subscription_id: SubscriptionId,
        trader_id: TraderId,
        analyst_id: AnalystId,
        tier_id: TierId,
        expires_at: Timestamp,
        occurred_at: Timestamp,
    },
    Renewed {
        event_id: EventId,
        subscription_id: SubscriptionId,
        new_expires_at: Timestamp,
        occurred_at: Timestamp,
    },
    PaymentFailed {
        event_id: EventId,
        subscription_id: SubscriptionId,
        retry_count: u32,
        grace_period_ends_at: Option<Timestamp>,
        occurred_at: Timestamp,
    },
    Suspended {
        event_id: EventId,
        subscription_id: SubscriptionId,
        reason: SuspensionReason,
        occurred_at: Timestamp,
    },
    Resumed {
        event_id: EventId,
        subscription_id: SubscriptionId,
        occurred_at: Timestamp,
    },
    Cancelled {
        event_id: EventId,
        subscription_id: SubscriptionId,
        at_cycle_end: bool,
        occurred_at: Timestamp,
    },
    Expired {
        event_id: EventId,
        subscription_id: SubscriptionId,
        reason: ExpiryReason,
        occurred_at: Timestamp,
    },
    TierChanged {
        event_id: EventId,
        subscription_id: SubscriptionId,
        tier_id: TierId,
        occurred_at: Timestamp,
    },
}

impl SubscriptionEvent {
    fn subscription_id(&self) -> &SubscriptionId {
        match self {
            SubscriptionEvent::Activated { subscription_id, .. }
            | SubscriptionEvent::Renewed { subscription_id, .. }
            | SubscriptionEvent::PaymentFailed { subscription_id, .. }
            | SubscriptionEvent::Suspended { subscription_id, .. }
            | SubscriptionEvent::Resumed { subscription_id, .. }
            | SubscriptionEvent::Cancelled { subscription_id, .. }
            | SubscriptionEvent::Expired { subscription_id, .. }
            | SubscriptionEvent::TierChanged { subscription_id, .. } => subscription_id,
        }
    }
}

impl DomainEvent for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubscriptionEvent::Activated { .. } => "subscription.activated.v1",
            SubscriptionEvent::Renewed { .. } => "subscription.renewed.v1",
            SubscriptionEvent::PaymentFailed { .. } => "subscription.payment_failed.v1",
            SubscriptionEvent::Suspended { .. } => "subscription.suspended.v1",
            SubscriptionEvent::Resumed { .. } => "subscription.resumed.v1",
            SubscriptionEvent::Cancelled { .. } => "subscription.cancelled.v1",
            SubscriptionEvent::Expired { .. } => "subscription.expired.v1",
            SubscriptionEvent::TierChanged { .. } => "subscription.tier_changed.v1",
        }
    }

    fn aggregate_id(&self) -> String {
        self.subscription_id().to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Subscription"
    }

    fn occurred_at(&self) -> Timestamp {
        match self {
            SubscriptionEvent::Activated { occurred_at, .. }
            | SubscriptionEvent::Renewed { occurred_at, .. }
            | SubscriptionEvent::PaymentFailed { occurred_at, .. }
            | SubscriptionEvent::Suspended { occurred_at, .. }
            | SubscriptionEvent::Resumed { occurred_at, .. }
            | SubscriptionEvent::Cancelled { occurred_at, .. }
            | SubscriptionEvent::Expired { occurred_at, .. }
            | SubscriptionEvent::TierChanged { occurred_at, .. } => *occurred_at,
        }
    }

    fn event_id(&self) -> EventId {
        match self {
            SubscriptionEvent::Activated { event_id, .. }
            | SubscriptionEvent::Renewed { event_id, .. }
            | SubscriptionEvent::PaymentFailed { event_id, .. }
            | SubscriptionEvent::Suspended { event_id, .. }
            | SubscriptionEvent::Resumed { event_id, .. }
            | SubscriptionEvent::Cancelled { event_id, .. }
            | SubscriptionEvent::Expired { event_id, .. }
            | SubscriptionEvent::TierChanged { event_id, .. } => event_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SerializableDomainEvent;

    fn renewed_event() -> SubscriptionEvent {
        SubscriptionEvent::Renewed {
            event_id: EventId::new(),
            subscription_id: SubscriptionId::new(),
            new_expires_at: Timestamp::now(),
            occurred_at: Timestamp::now(),
        }
    }

    #[test]
    fn event_types_carry_version_suffix() {
        let event = renewed_event();
        assert_eq!(event.event_type(), "subscription.renewed.v1");
    }

    #[test]
    fn envelope_carries_aggregate_context() {
        let event = renewed_event();
        let envelope = event.to_envelope();

        assert_eq!(envelope.event_type, "subscription.renewed.v1");
        assert_eq!(envelope.schema_version, 1);
        assert_eq!(envelope.aggregate_type, "Subscription");
        assert_eq!(envelope.aggregate_id, event.aggregate_id());
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let event = SubscriptionEvent::Expired {
            event_id: EventId::new(),
            subscription_id: SubscriptionId::new(),
            reason: ExpiryReason::GraceElapsed,
            occurred_at: Timestamp::now(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "expired");
        assert_eq!(json["reason"], "grace_elapsed");
    }

    #[test]
    fn event_roundtrips_through_envelope_payload() {
        let event = renewed_event();
        let envelope = event.to_envelope();
        let parsed: SubscriptionEvent = envelope.payload_as().unwrap();

        assert_eq!(parsed.aggregate_id(), event.aggregate_id());
    }
}
