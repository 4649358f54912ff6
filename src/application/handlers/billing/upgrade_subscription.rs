//! UpgradeSubscriptionHandler - move an active subscription to a
//! higher-priced tier of the same analyst.
//!
//! Re-prices through the discount engine, swaps the gateway plan, and
//! records a typed tier change. The billing anchor is untouched: the new
//! price takes effect from the next renewal.

use std::sync::Arc;

use crate::domain::billing::{quote_discount, validate_discount, DiscountContext};
use crate::domain::foundation::{
    EventId, SerializableDomainEvent, SubscriptionId, TierId, Timestamp, TraderId,
};
use crate::domain::subscription::{
    SubscriptionError, SubscriptionEvent, SubscriptionStatus, TierChange,
};
use crate::ports::{
    CatalogRepository, CreatePlanRequest, EventPublisher, PaymentGateway, SubscriptionRepository,
};

/// Command to upgrade a subscription's tier.
#[derive(Debug, Clone)]
pub struct UpgradeSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub trader_id: TraderId,
    pub new_tier_id: TierId,
    pub discount_code: Option<String>,
}

/// Handler for tier upgrades.
pub struct UpgradeSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    catalog: Arc<dyn CatalogRepository>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl UpgradeSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: Arc<dyn CatalogRepository>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            subscriptions,
            catalog,
            gateway,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: UpgradeSubscriptionCommand) -> Result<(), SubscriptionError> {
        let mut subscription = self
            .subscriptions
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound)?;
        if subscription.trader_id != cmd.trader_id {
            return Err(SubscriptionError::NotFound);
        }
        if subscription.status != SubscriptionStatus::Active {
            return Err(SubscriptionError::invalid_state(
                subscription.status.to_string(),
                "only active subscriptions can be upgraded",
            ));
        }

        let new_tier = self
            .catalog
            .find_tier(&cmd.new_tier_id)
            .await?
            .filter(|t| t.active)
            .ok_or(SubscriptionError::TierNotFound)?;
        if new_tier.analyst_id != subscription.analyst_id {
            return Err(SubscriptionError::TierNotFound);
        }

        let new_price = new_tier.price_for(subscription.billing_cycle);
        if new_price <= subscription.price_paid {
            return Err(SubscriptionError::invalid_state(
                subscription.status.to_string(),
                "upgrades must move to a higher-priced tier",
            ));
        }

        let discount_applied = match &cmd.discount_code {
            None => 0,
            Some(code) => {
                let discount = self
                    .catalog
                    .find_discount_by_code(&new_tier.analyst_id, code)
                    .await?
                    .ok_or_else(|| {
                        SubscriptionError::DiscountRejected(
                            "This discount code does not exist".to_string(),
                        )
                    })?;

                let ctx = DiscountContext {
                    now: Timestamp::now(),
                    tier_id: new_tier.id,
                    billing_cycle: subscription.billing_cycle,
                    prior_uses_by_trader: self
                        .subscriptions
                        .count_discount_uses(&discount.id, &cmd.trader_id)
                        .await?,
                    has_prior_subscription_with_analyst: true,
                };
                validate_discount(&discount, &ctx)
                    .map_err(|e| SubscriptionError::DiscountRejected(e.to_string()))?;

                quote_discount(&discount, new_price).discount_amount
            }
        };

        let plan = self
            .gateway
            .create_plan(CreatePlanRequest {
                analyst_id: new_tier.analyst_id,
                name: format!("{} ({})", new_tier.name, subscription.billing_cycle),
                billing_cycle: subscription.billing_cycle,
                amount: new_price - discount_applied,
            })
            .await?;

        subscription
            .change_tier(TierChange {
                tier_id: new_tier.id,
                price_paid: new_price,
                discount_applied,
                gateway_plan_id: Some(plan.id),
            })
            .map_err(|e| {
                SubscriptionError::invalid_state(subscription.status.to_string(), e.to_string())
            })?;
        self.subscriptions.update(&subscription).await?;

        let event = SubscriptionEvent::TierChanged {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            tier_id: new_tier.id,
            occurred_at: Timestamp::now(),
        };
        if let Err(e) = self.publisher.publish(event.to_envelope()).await {
            tracing::warn!(error = %e, subscription_id = %subscription.id, "event publish failed after upgrade");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventPublisher;
    use crate::adapters::gateway::MockPaymentGateway;
    use crate::adapters::memory::{InMemoryCatalog, InMemorySubscriptionRepository};
    use crate::domain::billing::SubscriptionTier;
    use crate::domain::foundation::AnalystId;
    use crate::domain::subscription::{BillingCycle, FirstCharge, Subscription};

    struct Fixture {
        subscriptions: Arc<InMemorySubscriptionRepository>,
        catalog: Arc<InMemoryCatalog>,
        publisher: Arc<InMemoryEventPublisher>,
        handler: UpgradeSubscriptionHandler,
        analyst_id: AnalystId,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let handler = UpgradeSubscriptionHandler::new(
            subscriptions.clone(),
            catalog.clone(),
            Arc::new(MockPaymentGateway::new()),
            publisher.clone(),
        );
        Fixture {
            subscriptions,
            catalog,
            publisher,
            handler,
            analyst_id: AnalystId::new(),
        }
    }

    fn tier(analyst_id: AnalystId, monthly_price: i64) -> SubscriptionTier {
        SubscriptionTier {
            id: TierId::new(),
            analyst_id,
            name: "Tier".to_string(),
            monthly_price,
            yearly_price: monthly_price * 10,
            features: vec![],
            max_subscribers: None,
            active: true,
            created_at: Timestamp::now(),
        }
    }

    async fn seed_active(f: &Fixture, tier_id: TierId, price: i64) -> Subscription {
        let mut sub = Subscription::checkout(
            SubscriptionId::new(),
            TraderId::new(),
            f.analyst_id,
            tier_id,
            BillingCycle::Monthly,
            price,
            0,
            None,
        );
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_1".to_string(),
            amount: price,
            occurred_at: Timestamp::now(),
        })
        .unwrap();
        f.subscriptions.save(&sub).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn upgrade_reprices_and_swaps_plan() {
        let f = fixture();
        let basic = tier(f.analyst_id, 99_900);
        let pro = tier(f.analyst_id, 199_900);
        f.catalog.insert_tier(basic.clone());
        f.catalog.insert_tier(pro.clone());

        let sub = seed_active(&f, basic.id, 99_900).await;
        let old_expiry = sub.expires_at;

        f.handler
            .handle(UpgradeSubscriptionCommand {
                subscription_id: sub.id,
                trader_id: sub.trader_id,
                new_tier_id: pro.id,
                discount_code: None,
            })
            .await
            .unwrap();

        let stored = f.subscriptions.snapshot().remove(0);
        assert_eq!(stored.tier_id, pro.id);
        assert_eq!(stored.price_paid, 199_900);
        assert_eq!(stored.final_price, 199_900);
        // Billing anchor untouched by the upgrade
        assert_eq!(stored.expires_at, old_expiry);
        assert_eq!(
            f.publisher.published_types(),
            vec!["subscription.tier_changed.v1"]
        );
    }

    #[tokio::test]
    async fn downgrade_is_rejected() {
        let f = fixture();
        let basic = tier(f.analyst_id, 99_900);
        let cheaper = tier(f.analyst_id, 49_900);
        f.catalog.insert_tier(basic.clone());
        f.catalog.insert_tier(cheaper.clone());

        let sub = seed_active(&f, basic.id, 99_900).await;

        let err = f
            .handler
            .handle(UpgradeSubscriptionCommand {
                subscription_id: sub.id,
                trader_id: sub.trader_id,
                new_tier_id: cheaper.id,
                discount_code: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn cross_analyst_tier_is_not_found() {
        let f = fixture();
        let basic = tier(f.analyst_id, 99_900);
        let foreign = tier(AnalystId::new(), 199_900);
        f.catalog.insert_tier(basic.clone());
        f.catalog.insert_tier(foreign.clone());

        let sub = seed_active(&f, basic.id, 99_900).await;

        let err = f
            .handler
            .handle(UpgradeSubscriptionCommand {
                subscription_id: sub.id,
                trader_id: sub.trader_id,
                new_tier_id: foreign.id,
                discount_code: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::TierNotFound));
    }
}
