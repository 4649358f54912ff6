//! ResumeSubscriptionHandler - trader-initiated resume.

use std::sync::Arc;

use crate::domain::foundation::{
    EventId, SerializableDomainEvent, SubscriptionId, Timestamp, TraderId,
};
use crate::domain::subscription::{SubscriptionError, SubscriptionEvent};
use crate::ports::{EventPublisher, PaymentGateway, SubscriptionRepository};

/// Command to resume a suspended subscription.
#[derive(Debug, Clone)]
pub struct ResumeSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub trader_id: TraderId,
}

/// Handler for resuming.
pub struct ResumeSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl ResumeSubscriptionHandler {
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

    pub async fn handle(&self, cmd: ResumeSubscriptionCommand) -> Result<(), SubscriptionError> {
        let mut subscription = self
            .subscriptions
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound)?;
        if subscription.trader_id != cmd.trader_id {
            return Err(SubscriptionError::NotFound);
        }

        if let Some(gateway_subscription_id) = subscription.gateway_subscription_id.clone() {
            self.gateway
                .resume_subscription(&gateway_subscription_id)
                .await?;
        }

        subscription.resume().map_err(|e| {
            SubscriptionError::invalid_state(subscription.status.to_string(), e.to_string())
        })?;
        self.subscriptions.update(&subscription).await?;

        let event = SubscriptionEvent::Resumed {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            occurred_at: Timestamp::now(),
        };
        if let Err(e) = self.publisher.publish(event.to_envelope()).await {
            tracing::warn!(error = %e, subscription_id = %subscription.id, "event publish failed after resume");
        }

        Ok(())
    }
}
