//! CancelSubscriptionHandler - trader-initiated cancellation.
//!
//! Cancels at the gateway first, then transitions locally. A gateway
//! timeout leaves the local row untouched ("outcome unknown"): the
//! cancellation webhook or the scheduler sweep reconciles it.

use std::sync::Arc;

use crate::domain::foundation::{EventId, SerializableDomainEvent, SubscriptionId, Timestamp, TraderId};
use crate::domain::subscription::{CancelMode, SubscriptionError, SubscriptionEvent};
use crate::ports::{EventPublisher, PaymentGateway, SubscriptionRepository};

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub trader_id: TraderId,
    pub mode: CancelMode,
}

/// Handler for cancellation.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            subscriptions,
            gateway,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: CancelSubscriptionCommand) -> Result<(), SubscriptionError> {
        let mut subscription = self
            .subscriptions
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound)?;

        // Ownership check; foreign subscriptions look like missing ones
        if subscription.trader_id != cmd.trader_id {
            return Err(SubscriptionError::NotFound);
        }

        if let Some(gateway_subscription_id) = subscription.gateway_subscription_id.clone() {
            let at_cycle_end = matches!(cmd.mode, CancelMode::AtCycleEnd);
            self.gateway
                .cancel_subscription(&gateway_subscription_id, at_cycle_end)
                .await?;
        }

        subscription.cancel(cmd.mode).map_err(|e| {
            SubscriptionError::invalid_state(subscription.status.to_string(), e.to_string())
        })?;
        self.subscriptions.update(&subscription).await?;

        let event = SubscriptionEvent::Cancelled {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            at_cycle_end: matches!(cmd.mode, CancelMode::AtCycleEnd),
            occurred_at: Timestamp::now(),
        };
        if let Err(e) = self.publisher.publish(event.to_envelope()).await {
            tracing::warn!(error = %e, subscription_id = %subscription.id, "event publish failed after cancel");
        }

        Ok(())
    }
}
