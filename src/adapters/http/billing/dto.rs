//! Request/response DTOs for billing endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::handlers::billing::CheckoutDetails;
use crate::domain::foundation::Timestamp;
use crate::domain::ledger::PayoutStatement;
use crate::domain::subscription::{BillingCycle, Subscription};

/// POST /billing/checkout
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub tier_id: Uuid,
    pub billing_cycle: BillingCycle,
    pub discount_code: Option<String>,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub subscription_id: Uuid,
    pub gateway_subscription_id: String,
    pub gateway_customer_id: String,
    pub gateway_plan_id: String,
    pub checkout_url: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub tier_name: String,
}

impl From<CheckoutDetails> for CheckoutResponse {
    fn from(details: CheckoutDetails) -> Self {
        Self {
            subscription_id: *details.subscription_id.as_uuid(),
            gateway_subscription_id: details.gateway_subscription_id,
            gateway_customer_id: details.gateway_customer_id,
            gateway_plan_id: details.gateway_plan_id,
            checkout_url: details.checkout_url,
            amount: details.amount,
            currency: details.currency,
            tier_name: details.tier_name,
        }
    }
}

/// POST /billing/checkout/verify
#[derive(Debug, Deserialize)]
pub struct VerifyCheckoutRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCheckoutResponse {
    pub verified: bool,
}

/// POST /billing/subscriptions/:id/cancel
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub at_cycle_end: bool,
}

/// POST /billing/subscriptions/:id/upgrade
#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub tier_id: Uuid,
    pub discount_code: Option<String>,
}

/// Subscription view exposed to collaborators.
///
/// Carries exactly the fields feed-access and chat-access checks read:
/// status, expiry, auto-renewal, pricing, and tier.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub analyst_id: Uuid,
    pub tier_id: Uuid,
    pub status: String,
    pub billing_cycle: String,
    pub final_price: i64,
    pub expires_at: Option<Timestamp>,
    pub next_billing_date: Option<Timestamp>,
    pub auto_renewal: bool,
    pub payment_retry_count: u32,
    pub grace_period_ends_at: Option<Timestamp>,
    pub has_access: bool,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: *sub.id.as_uuid(),
            analyst_id: *sub.analyst_id.as_uuid(),
            tier_id: *sub.tier_id.as_uuid(),
            status: sub.status.as_str().to_string(),
            billing_cycle: sub.billing_cycle.as_str().to_string(),
            final_price: sub.final_price,
            expires_at: sub.expires_at,
            next_billing_date: sub.next_billing_date,
            auto_renewal: sub.auto_renewal,
            payment_retry_count: sub.payment_retry_count,
            grace_period_ends_at: sub.grace_period_ends_at,
            has_access: sub.has_access(),
        }
    }
}

/// GET /billing/analysts/:id/payout
#[derive(Debug, Deserialize)]
pub struct PayoutQuery {
    /// RFC3339; defaults to 30 days ago.
    pub from: Option<Timestamp>,
    /// RFC3339; defaults to now.
    pub to: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct PayoutResponse {
    pub analyst_id: Uuid,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub total_revenue: i64,
    pub platform_commission: i64,
    pub analyst_payout: i64,
}

impl From<PayoutStatement> for PayoutResponse {
    fn from(statement: PayoutStatement) -> Self {
        Self {
            analyst_id: *statement.analyst_id.as_uuid(),
            period_start: statement.period_start,
            period_end: statement.period_end,
            total_revenue: statement.total_revenue,
            platform_commission: statement.platform_commission,
            analyst_payout: statement.analyst_payout,
        }
    }
}

/// Standard error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
