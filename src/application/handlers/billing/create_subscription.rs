//! CreateSubscriptionHandler - checkout creation.
//!
//! Runs the full admission sequence: one-active-per-pair, tier capacity,
//! discount validation, gateway plan/customer/subscription creation, and
//! finally the local `pending_payment` row. The subscription goes live
//! only when the gateway confirms the first charge via webhook.

use std::sync::Arc;

use crate::domain::billing::{admit_to_tier, quote_discount, validate_discount, DiscountContext};
use crate::domain::foundation::{SubscriptionId, TierId, Timestamp, TraderId};
use crate::domain::subscription::{BillingCycle, Subscription, SubscriptionError};
use crate::ports::{
    CatalogRepository, CreateCustomerRequest, CreateGatewaySubscriptionRequest, CreatePlanRequest,
    PaymentGateway, SubscriptionRepository,
};

/// Gateway cycles requested up front, by cadence.
const MONTHLY_TOTAL_CYCLES: u32 = 12;
const YEARLY_TOTAL_CYCLES: u32 = 1;

/// Command to start a paid subscription checkout.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub trader_id: TraderId,
    pub tier_id: TierId,
    pub billing_cycle: BillingCycle,
    pub discount_code: Option<String>,
    pub trader_email: String,
    pub trader_name: Option<String>,
}

/// Checkout parameters handed to the client-side payment flow.
///
/// Never contains card data; the trader completes payment against the
/// gateway directly.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub subscription_id: SubscriptionId,
    pub gateway_subscription_id: String,
    pub gateway_customer_id: String,
    pub gateway_plan_id: String,
    pub checkout_url: Option<String>,
    /// Final per-cycle amount in paise, after discount.
    pub amount: i64,
    pub currency: String,
    pub tier_name: String,
}

/// Handler for checkout creation.
pub struct CreateSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    catalog: Arc<dyn CatalogRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CreateSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: Arc<dyn CatalogRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            subscriptions,
            catalog,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CheckoutDetails, SubscriptionError> {
        // 1. Tier must exist and be open
        let tier = self
            .catalog
            .find_tier(&cmd.tier_id)
            .await?
            .filter(|t| t.active)
            .ok_or(SubscriptionError::TierNotFound)?;

        // 2. Exactly one active subscription per (trader, analyst)
        if self
            .subscriptions
            .find_active_for_pair(&cmd.trader_id, &tier.analyst_id)
            .await?
            .is_some()
        {
            return Err(SubscriptionError::AlreadySubscribed);
        }

        // 3. Capacity, checked at creation only
        let active_on_tier = self.subscriptions.count_active_on_tier(&tier.id).await?;
        if !admit_to_tier(&tier, active_on_tier) {
            return Err(SubscriptionError::TierFull);
        }

        // 4. Price and optional discount
        let list_price = tier.price_for(cmd.billing_cycle);
        let discount = match &cmd.discount_code {
            None => None,
            Some(code) => {
                let discount = self
                    .catalog
                    .find_discount_by_code(&tier.analyst_id, code)
                    .await?
                    .ok_or_else(|| {
                        SubscriptionError::DiscountRejected(
                            "This discount code does not exist".to_string(),
                        )
                    })?;

                let ctx = DiscountContext {
                    now: Timestamp::now(),
                    tier_id: tier.id,
                    billing_cycle: cmd.billing_cycle,
                    prior_uses_by_trader: self
                        .subscriptions
                        .count_discount_uses(&discount.id, &cmd.trader_id)
                        .await?,
                    has_prior_subscription_with_analyst: self
                        .subscriptions
                        .has_any_for_pair(&cmd.trader_id, &tier.analyst_id)
                        .await?,
                };
                validate_discount(&discount, &ctx)
                    .map_err(|e| SubscriptionError::DiscountRejected(e.to_string()))?;

                let quote = quote_discount(&discount, list_price);
                Some((discount, quote))
            }
        };
        let discount_applied = discount.as_ref().map(|(_, q)| q.discount_amount).unwrap_or(0);
        let final_price = list_price - discount_applied;

        // 5. Gateway plan, customer, subscription
        let plan = self
            .gateway
            .create_plan(CreatePlanRequest {
                analyst_id: tier.analyst_id,
                name: format!("{} ({})", tier.name, cmd.billing_cycle),
                billing_cycle: cmd.billing_cycle,
                amount: final_price,
            })
            .await?;

        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                trader_id: cmd.trader_id,
                email: cmd.trader_email.clone(),
                name: cmd.trader_name.clone(),
            })
            .await?;

        let total_cycles = match cmd.billing_cycle {
            BillingCycle::Monthly => MONTHLY_TOTAL_CYCLES,
            BillingCycle::Yearly => YEARLY_TOTAL_CYCLES,
        };
        let handle = self
            .gateway
            .create_subscription(CreateGatewaySubscriptionRequest {
                plan_id: plan.id.clone(),
                customer_id: customer.id.clone(),
                total_cycles,
            })
            .await?;

        // 6. Local pending_payment row
        let mut subscription = Subscription::checkout(
            SubscriptionId::new(),
            cmd.trader_id,
            tier.analyst_id,
            tier.id,
            cmd.billing_cycle,
            list_price,
            discount_applied,
            discount.as_ref().map(|(d, _)| d.id),
        );
        subscription.attach_gateway_refs(&handle.id, &customer.id, &plan.id);
        self.subscriptions.save(&subscription).await?;

        if let Some((code, _)) = &discount {
            self.catalog.increment_discount_usage(&code.id).await?;
        }

        Ok(CheckoutDetails {
            subscription_id: subscription.id,
            gateway_subscription_id: handle.id,
            gateway_customer_id: customer.id,
            gateway_plan_id: plan.id,
            checkout_url: handle.short_url,
            amount: final_price,
            currency: "INR".to_string(),
            tier_name: tier.name,
        })
    }
}
