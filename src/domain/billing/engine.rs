//! Discount validation and tier capacity engine.
//!
//! Pure decision logic applied at subscription-creation time. Checks run
//! in a fixed order and short-circuit with a specific, user-facing reason.

use crate::domain::foundation::{TierId, Timestamp};
use crate::domain::subscription::BillingCycle;
use thiserror::Error;

use super::{DiscountCode, SubscriptionTier};

/// Why a discount code was rejected. Messages are shown to traders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("This discount code is no longer active")]
    Inactive,

    #[error("This discount code is not valid yet")]
    NotYetValid,

    #[error("This discount code has expired")]
    Expired,

    #[error("This discount code has reached its usage limit")]
    UsageLimitReached,

    #[error("You have already used this discount code the maximum number of times")]
    PerUserLimitReached,

    #[error("This discount code is not valid for {cycle} billing")]
    CycleMismatch { cycle: BillingCycle },

    #[error("This discount code does not apply to the selected tier")]
    TierMismatch,

    #[error("This discount code is only valid for first-time subscribers")]
    FirstTimeOnly,
}

/// Everything the validation checks need to know about the trader.
#[derive(Debug, Clone, Copy)]
pub struct DiscountContext {
    pub now: Timestamp,
    pub tier_id: TierId,
    pub billing_cycle: BillingCycle,
    /// Historical subscriptions by this trader that used this code.
    pub prior_uses_by_trader: u32,
    /// Whether the trader ever subscribed to this analyst before.
    pub has_prior_subscription_with_analyst: bool,
}

/// Result of a successful discount application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountQuote {
    pub discount_amount: i64,
    pub final_price: i64,
}

/// Validates a discount code against the checkout context.
///
/// Checks run in order: active → window → usage limit → per-user limit →
/// billing-cycle restriction → tier applicability → first-time restriction.
/// The first failed check wins.
pub fn validate_discount(code: &DiscountCode, ctx: &DiscountContext) -> Result<(), DiscountError> {
    if !code.active {
        return Err(DiscountError::Inactive);
    }

    if ctx.now.is_before(&code.valid_from) {
        return Err(DiscountError::NotYetValid);
    }
    if let Some(until) = code.valid_until {
        if ctx.now.is_after(&until) {
            return Err(DiscountError::Expired);
        }
    }

    if let Some(limit) = code.usage_limit {
        if code.usage_count >= limit {
            return Err(DiscountError::UsageLimitReached);
        }
    }

    if let Some(per_user) = code.per_user_limit {
        if ctx.prior_uses_by_trader >= per_user {
            return Err(DiscountError::PerUserLimitReached);
        }
    }

    if !code.applies_to_cycle(ctx.billing_cycle) {
        return Err(DiscountError::CycleMismatch {
            cycle: ctx.billing_cycle,
        });
    }

    if !code.applies_to_tier(&ctx.tier_id) {
        return Err(DiscountError::TierMismatch);
    }

    if code.first_time_only && ctx.has_prior_subscription_with_analyst {
        return Err(DiscountError::FirstTimeOnly);
    }

    Ok(())
}

/// Computes the discounted price for a validated code.
pub fn quote_discount(code: &DiscountCode, price: i64) -> DiscountQuote {
    let discount_amount = code.discount_amount(price);
    DiscountQuote {
        discount_amount,
        final_price: price - discount_amount,
    }
}

/// Capacity admission for a tier, checked at creation time only.
///
/// Returns the count-based decision; `active_subscribers` must be the
/// number of currently-active subscriptions on the tier.
pub fn admit_to_tier(tier: &SubscriptionTier, active_subscribers: u64) -> bool {
    tier.has_capacity(active_subscribers)
}
