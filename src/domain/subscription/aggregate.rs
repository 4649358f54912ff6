//! Subscription aggregate entity.
//!
//! One trader's relationship to one analyst under one pricing tier.
//!
//! # Design Decisions
//!
//! - **Money in paise**: All monetary values stored as i64 paise (not floats)
//! - **One active per pair**: At most one active subscription per
//!   (trader, analyst), enforced before creation
//! - **Anchored renewals**: Renewal advances `expires_at` from its current
//!   value, never from "now", so webhook delivery jitter cannot shift the
//!   billing date
//! - **Tombstone, not timestamp**: Soft delete is an explicit `deleted` flag
//!   checked by all queries

use crate::domain::foundation::{
    AnalystId, DiscountCodeId, DomainError, ErrorCode, SubscriptionId, TierId, Timestamp, TraderId,
};
use serde::{Deserialize, Serialize};

use super::{BillingCycle, SubscriptionStatus};

/// Maximum consecutive automatic payment retries before forced suspension.
pub const MAX_PAYMENT_RETRIES: u32 = 3;

/// Days of continued service after the first payment failure.
pub const GRACE_PERIOD_DAYS: i64 = 7;

/// First successful charge for a pending subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstCharge {
    pub gateway_payment_id: String,
    pub amount: i64,
    pub occurred_at: Timestamp,
}

/// Successful recurring charge for an existing subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalCharge {
    pub gateway_payment_id: String,
    pub amount: i64,
    pub occurred_at: Timestamp,
}

/// A failed charge attempt reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeFailure {
    pub gateway_payment_id: Option<String>,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub occurred_at: Timestamp,
}

/// How a cancellation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Access ends now.
    Immediate,
    /// Auto-renewal stops; access continues until natural expiry.
    AtCycleEnd,
}

/// Re-pricing applied when an active subscription changes tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChange {
    pub tier_id: TierId,
    pub price_paid: i64,
    pub discount_applied: i64,
    pub gateway_plan_id: Option<String>,
}

/// Outcome of recording a charge failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retry budget remains; the scheduler will retry.
    Retrying { retry_count: u32 },
    /// Retry ceiling reached; subscription was suspended.
    Suspended,
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - `final_price = price_paid - discount_applied >= 0`
/// - `payment_retry_count <= 3`, reset to 0 whenever status returns to Active
/// - `grace_period_ends_at` set on first failure, cleared on recovery or
///   terminal close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub trader_id: TraderId,
    pub analyst_id: AnalystId,
    pub tier_id: TierId,

    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,

    /// Tier list price at time of purchase, in paise. Immutable.
    pub price_paid: i64,
    /// Discount applied at purchase, in paise.
    pub discount_applied: i64,
    /// price_paid - discount_applied. Never negative.
    pub final_price: i64,

    pub start_date: Timestamp,
    /// Set on activation; advanced in place on every renewal.
    pub expires_at: Option<Timestamp>,
    pub next_billing_date: Option<Timestamp>,

    pub auto_renewal: bool,
    pub payment_retry_count: u32,
    pub grace_period_ends_at: Option<Timestamp>,

    pub cancelled_at: Option<Timestamp>,
    pub suspended_at: Option<Timestamp>,

    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub gateway_plan_id: Option<String>,
    pub discount_code_id: Option<DiscountCodeId>,

    /// Tombstone flag; tombstoned rows are excluded from all queries.
    pub deleted: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a new subscription awaiting its first charge.
    ///
    /// Pricing is fixed here and never recomputed: `price_paid` is the
    /// tier's list price at checkout time.
    #[allow(clippy::too_many_arguments)]
    pub fn checkout(
        id: SubscriptionId,
        trader_id: TraderId,
        analyst_id: AnalystId,
        tier_id: TierId,
        billing_cycle: BillingCycle,
        price_paid: i64,
        discount_applied: i64,
        discount_code_id: Option<DiscountCodeId>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            trader_id,
            analyst_id,
            tier_id,
            status: SubscriptionStatus::PendingPayment,
            billing_cycle,
            price_paid,
            discount_applied,
            final_price: (price_paid - discount_applied).max(0),
            start_date: now,
            expires_at: None,
            next_billing_date: None,
            auto_renewal: true,
            payment_retry_count: 0,
            grace_period_ends_at: None,
            cancelled_at: None,
            suspended_at: None,
            gateway_subscription_id: None,
            gateway_customer_id: None,
            gateway_plan_id: None,
            discount_code_id,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches the identifiers returned by the gateway at checkout time.
    pub fn attach_gateway_refs(
        &mut self,
        subscription_id: impl Into<String>,
        customer_id: impl Into<String>,
        plan_id: impl Into<String>,
    ) {
        self.gateway_subscription_id = Some(subscription_id.into());
        self.gateway_customer_id = Some(customer_id.into());
        self.gateway_plan_id = Some(plan_id.into());
        self.updated_at = Timestamp::now();
    }

    /// Returns true if this subscription currently grants content access.
    pub fn has_access(&self) -> bool {
        !self.deleted && self.status.has_access()
    }

    /// First charge captured: pending_payment -> active.
    ///
    /// Clears the retry counter and sets the billing anchor: `expires_at`
    /// becomes `start_date` plus one cycle.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription is not awaiting its first charge.
    pub fn activate(&mut self, charge: &FirstCharge) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        let expires = self.billing_cycle.advance(self.start_date);
        self.expires_at = Some(expires);
        self.next_billing_date = Some(expires);
        self.payment_retry_count = 0;
        self.grace_period_ends_at = None;
        self.updated_at = charge.occurred_at;
        Ok(())
    }

    /// Renewal charge captured: active -> active, expiry pushed forward.
    ///
    /// Advances `expires_at` by one cycle *from its current value*, never
    /// from the delivery time.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription is not active or has no expiry set.
    pub fn renew(&mut self, charge: &RenewalCharge) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        let anchor = self.expires_at.ok_or_else(|| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Cannot renew a subscription that was never activated",
            )
        })?;
        let expires = self.billing_cycle.advance(anchor);
        self.expires_at = Some(expires);
        self.next_billing_date = Some(expires);
        self.payment_retry_count = 0;
        self.grace_period_ends_at = None;
        self.updated_at = charge.occurred_at;
        Ok(())
    }

    /// Successful charge after suspension: suspended -> active.
    ///
    /// Clears retry count and grace period, then pushes the expiry forward
    /// by one cycle from the existing anchor.
    pub fn recover(&mut self, charge: &RenewalCharge) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Suspended {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        let anchor = self.expires_at.unwrap_or(self.start_date);
        let expires = self.billing_cycle.advance(anchor);
        self.expires_at = Some(expires);
        self.next_billing_date = Some(expires);
        self.payment_retry_count = 0;
        self.grace_period_ends_at = None;
        self.suspended_at = None;
        self.updated_at = charge.occurred_at;
        Ok(())
    }

    /// Charge failed: increment the retry counter, open the grace window on
    /// the first failure, suspend once the ceiling is reached.
    ///
    /// The grace deadline is fixed at the first failure and never extended
    /// by subsequent failures.
    pub fn record_payment_failure(
        &mut self,
        failure: &ChargeFailure,
    ) -> Result<FailureOutcome, DomainError> {
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::PendingPayment => {}
            SubscriptionStatus::Suspended => {
                // Retries are exhausted; further failure reports are no-ops.
                return Ok(FailureOutcome::Suspended);
            }
            _ => return Err(self.invalid_transition(SubscriptionStatus::Suspended)),
        }

        self.payment_retry_count = (self.payment_retry_count + 1).min(MAX_PAYMENT_RETRIES);
        if self.grace_period_ends_at.is_none() {
            self.grace_period_ends_at = Some(failure.occurred_at.add_days(GRACE_PERIOD_DAYS));
        }
        self.updated_at = failure.occurred_at;

        if self.payment_retry_count >= MAX_PAYMENT_RETRIES
            && self.status == SubscriptionStatus::Active
        {
            self.transition_to(SubscriptionStatus::Suspended)?;
            self.suspended_at = Some(failure.occurred_at);
            return Ok(FailureOutcome::Suspended);
        }

        Ok(FailureOutcome::Retrying {
            retry_count: self.payment_retry_count,
        })
    }

    /// Trader- or gateway-initiated cancellation.
    ///
    /// Immediate cancellation terminalizes the row; end-of-cycle
    /// cancellation only disables auto-renewal and records the request, the
    /// row transitions to Cancelled at natural expiry.
    pub fn cancel(&mut self, mode: CancelMode) -> Result<(), DomainError> {
        match mode {
            CancelMode::Immediate => {
                self.transition_to(SubscriptionStatus::Cancelled)?;
                self.auto_renewal = false;
                self.cancelled_at = Some(Timestamp::now());
                self.grace_period_ends_at = None;
                self.updated_at = Timestamp::now();
            }
            CancelMode::AtCycleEnd => {
                if self.status != SubscriptionStatus::Active {
                    return Err(self.invalid_transition(SubscriptionStatus::Cancelled));
                }
                self.auto_renewal = false;
                self.cancelled_at = Some(Timestamp::now());
                self.updated_at = Timestamp::now();
            }
        }
        Ok(())
    }

    /// Explicit pause: active -> suspended, retry counter untouched.
    pub fn pause(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(self.invalid_transition(SubscriptionStatus::Suspended));
        }
        self.transition_to(SubscriptionStatus::Suspended)?;
        self.suspended_at = Some(Timestamp::now());
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Resume from pause or suspension: suspended -> active.
    ///
    /// Clears the retry counter and grace period.
    pub fn resume(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Suspended {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.payment_retry_count = 0;
        self.grace_period_ends_at = None;
        self.suspended_at = None;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Cycle completed with no renewal: active -> expired, or -> cancelled
    /// when an end-of-cycle cancellation was requested.
    pub fn close_at_period_end(&mut self) -> Result<(), DomainError> {
        let target = if self.cancelled_at.is_some() {
            SubscriptionStatus::Cancelled
        } else {
            SubscriptionStatus::Expired
        };
        self.transition_to(target)?;
        self.auto_renewal = false;
        self.grace_period_ends_at = None;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Grace period elapsed with no recovery: forced terminal close.
    pub fn force_close_after_grace(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Suspended {
            return Err(self.invalid_transition(SubscriptionStatus::Expired));
        }
        self.close_at_period_end()
    }

    /// Re-prices an active subscription onto a different tier.
    pub fn change_tier(&mut self, change: TierChange) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only active subscriptions can change tier",
            ));
        }
        self.tier_id = change.tier_id;
        self.price_paid = change.price_paid;
        self.discount_applied = change.discount_applied;
        self.final_price = (change.price_paid - change.discount_applied).max(0);
        if let Some(plan_id) = change.gateway_plan_id {
            self.gateway_plan_id = Some(plan_id);
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Tombstones the row. Never hard-deleted.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.updated_at = Timestamp::now();
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        use crate::domain::foundation::StateMachine;

        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| self.invalid_transition(target))?;
        Ok(())
    }

    fn invalid_transition(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot transition subscription from {} to {}",
                self.status, target
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(rfc3339: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn pending_subscription(cycle: BillingCycle) -> Subscription {
        Subscription::checkout(
            SubscriptionId::new(),
            TraderId::new(),
            AnalystId::new(),
            TierId::new(),
            cycle,
            99_900,
            9_990,
            None,
        )
    }

    fn active_subscription(cycle: BillingCycle) -> Subscription {
        let mut sub = pending_subscription(cycle);
        sub.start_date = ts("2024-01-15T00:00:00Z");
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_first".to_string(),
            amount: sub.final_price,
            occurred_at: ts("2024-01-15T00:05:00Z"),
        })
        .unwrap();
        sub
    }

    fn failure_at(rfc3339: &str) -> ChargeFailure {
        ChargeFailure {
            gateway_payment_id: Some("pay_fail".to_string()),
            failure_code: Some("BAD_FUNDS".to_string()),
            failure_reason: Some("insufficient funds".to_string()),
            occurred_at: ts(rfc3339),
        }
    }

    // Construction

    #[test]
    fn checkout_starts_pending_with_computed_final_price() {
        let sub = pending_subscription(BillingCycle::Monthly);

        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);
        assert_eq!(sub.final_price, 89_910);
        assert!(sub.auto_renewal);
        assert!(sub.expires_at.is_none());
        assert_eq!(sub.payment_retry_count, 0);
        assert!(!sub.deleted);
    }

    #[test]
    fn final_price_never_negative() {
        let sub = Subscription::checkout(
            SubscriptionId::new(),
            TraderId::new(),
            AnalystId::new(),
            TierId::new(),
            BillingCycle::Monthly,
            500,
            900,
            None,
        );
        assert_eq!(sub.final_price, 0);
    }

    // Activation and renewal anchoring

    #[test]
    fn activate_sets_expiry_one_cycle_from_start_date() {
        let sub = active_subscription(BillingCycle::Monthly);

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.expires_at, Some(ts("2024-02-15T00:00:00Z")));
        assert_eq!(sub.next_billing_date, sub.expires_at);
    }

    #[test]
    fn two_renewals_land_on_calendar_anchor() {
        // start 2024-01-15, activation + two renewals -> 2024-04-15
        let mut sub = active_subscription(BillingCycle::Monthly);

        for (i, delivered) in ["2024-02-14T23:00:00Z", "2024-03-16T04:00:00Z"]
            .iter()
            .enumerate()
        {
            sub.renew(&RenewalCharge {
                gateway_payment_id: format!("pay_renew_{}", i),
                amount: sub.final_price,
                occurred_at: ts(delivered),
            })
            .unwrap();
        }

        // Delivery jitter (early and late) did not shift the anchor
        assert_eq!(sub.expires_at, Some(ts("2024-04-15T00:00:00Z")));
    }

    #[test]
    fn yearly_renewal_adds_calendar_year() {
        let mut sub = active_subscription(BillingCycle::Yearly);
        assert_eq!(sub.expires_at, Some(ts("2025-01-15T00:00:00Z")));

        sub.renew(&RenewalCharge {
            gateway_payment_id: "pay_y".to_string(),
            amount: sub.final_price,
            occurred_at: Timestamp::now(),
        })
        .unwrap();
        assert_eq!(sub.expires_at, Some(ts("2026-01-15T00:00:00Z")));
    }

    #[test]
    fn renew_on_pending_fails() {
        let mut sub = pending_subscription(BillingCycle::Monthly);
        let result = sub.renew(&RenewalCharge {
            gateway_payment_id: "pay_x".to_string(),
            amount: 100,
            occurred_at: Timestamp::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn renewal_resets_retry_count_and_grace() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.record_payment_failure(&failure_at("2024-02-15T00:00:00Z"))
            .unwrap();
        assert_eq!(sub.payment_retry_count, 1);
        assert!(sub.grace_period_ends_at.is_some());

        sub.renew(&RenewalCharge {
            gateway_payment_id: "pay_ok".to_string(),
            amount: sub.final_price,
            occurred_at: ts("2024-02-16T00:00:00Z"),
        })
        .unwrap();

        assert_eq!(sub.payment_retry_count, 0);
        assert!(sub.grace_period_ends_at.is_none());
    }

    // Failure handling

    #[test]
    fn three_failures_suspend_with_grace_from_first() {
        let mut sub = active_subscription(BillingCycle::Monthly);

        let o1 = sub
            .record_payment_failure(&failure_at("2024-02-15T00:00:00Z"))
            .unwrap();
        assert_eq!(o1, FailureOutcome::Retrying { retry_count: 1 });
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(
            sub.grace_period_ends_at,
            Some(ts("2024-02-22T00:00:00Z"))
        );

        let o2 = sub
            .record_payment_failure(&failure_at("2024-02-16T00:00:00Z"))
            .unwrap();
        assert_eq!(o2, FailureOutcome::Retrying { retry_count: 2 });
        assert_eq!(sub.status, SubscriptionStatus::Active);

        let o3 = sub
            .record_payment_failure(&failure_at("2024-02-17T00:00:00Z"))
            .unwrap();
        assert_eq!(o3, FailureOutcome::Suspended);
        assert_eq!(sub.status, SubscriptionStatus::Suspended);
        assert_eq!(sub.payment_retry_count, 3);

        // Grace deadline stays anchored to the FIRST failure
        assert_eq!(
            sub.grace_period_ends_at,
            Some(ts("2024-02-22T00:00:00Z"))
        );
    }

    #[test]
    fn fourth_failure_is_a_no_op() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        for day in ["2024-02-15", "2024-02-16", "2024-02-17"] {
            sub.record_payment_failure(&failure_at(&format!("{}T00:00:00Z", day)))
                .unwrap();
        }

        let outcome = sub
            .record_payment_failure(&failure_at("2024-02-18T00:00:00Z"))
            .unwrap();
        assert_eq!(outcome, FailureOutcome::Suspended);
        assert_eq!(sub.payment_retry_count, 3);
    }

    #[test]
    fn failure_on_pending_keeps_pending() {
        let mut sub = pending_subscription(BillingCycle::Monthly);
        sub.record_payment_failure(&failure_at("2024-01-15T01:00:00Z"))
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);
        assert_eq!(sub.payment_retry_count, 1);
        assert!(sub.grace_period_ends_at.is_some());
    }

    #[test]
    fn recover_from_suspension_clears_counters() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        for day in ["2024-02-15", "2024-02-16", "2024-02-17"] {
            sub.record_payment_failure(&failure_at(&format!("{}T00:00:00Z", day)))
                .unwrap();
        }
        assert_eq!(sub.status, SubscriptionStatus::Suspended);

        sub.recover(&RenewalCharge {
            gateway_payment_id: "pay_retry_ok".to_string(),
            amount: sub.final_price,
            occurred_at: ts("2024-02-18T00:00:00Z"),
        })
        .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.payment_retry_count, 0);
        assert!(sub.grace_period_ends_at.is_none());
        assert!(sub.suspended_at.is_none());
        // Expiry advanced from the old anchor, not from the recovery time
        assert_eq!(sub.expires_at, Some(ts("2024-03-15T00:00:00Z")));
    }

    // Cancellation

    #[test]
    fn immediate_cancel_terminalizes() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.cancel(CancelMode::Immediate).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert!(!sub.auto_renewal);
        assert!(sub.cancelled_at.is_some());
    }

    #[test]
    fn cancel_at_cycle_end_keeps_active() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.cancel(CancelMode::AtCycleEnd).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(!sub.auto_renewal);
        assert!(sub.cancelled_at.is_some());
    }

    #[test]
    fn cycle_end_after_requested_cancel_resolves_to_cancelled() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.cancel(CancelMode::AtCycleEnd).unwrap();
        sub.close_at_period_end().unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn cycle_end_without_cancel_resolves_to_expired() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.close_at_period_end().unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Expired);
        assert!(!sub.auto_renewal);
    }

    #[test]
    fn suspended_can_cancel_immediately() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.pause().unwrap();
        sub.cancel(CancelMode::Immediate).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn cancelled_cannot_be_cancelled_again() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.cancel(CancelMode::Immediate).unwrap();
        assert!(sub.cancel(CancelMode::Immediate).is_err());
    }

    // Pause / resume

    #[test]
    fn pause_does_not_touch_retry_counter() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.record_payment_failure(&failure_at("2024-02-15T00:00:00Z"))
            .unwrap();
        sub.pause().unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Suspended);
        assert_eq!(sub.payment_retry_count, 1);
        assert!(sub.suspended_at.is_some());
    }

    #[test]
    fn resume_clears_retry_and_grace() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.record_payment_failure(&failure_at("2024-02-15T00:00:00Z"))
            .unwrap();
        sub.pause().unwrap();
        sub.resume().unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.payment_retry_count, 0);
        assert!(sub.grace_period_ends_at.is_none());
        assert!(sub.suspended_at.is_none());
    }

    #[test]
    fn resume_on_active_fails() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        assert!(sub.resume().is_err());
    }

    // Grace close

    #[test]
    fn force_close_after_grace_expires_suspended() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        for day in ["2024-02-15", "2024-02-16", "2024-02-17"] {
            sub.record_payment_failure(&failure_at(&format!("{}T00:00:00Z", day)))
                .unwrap();
        }

        sub.force_close_after_grace().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Expired);
    }

    #[test]
    fn force_close_after_grace_honors_requested_cancellation() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.cancel(CancelMode::AtCycleEnd).unwrap();
        for day in ["2024-02-15", "2024-02-16", "2024-02-17"] {
            sub.record_payment_failure(&failure_at(&format!("{}T00:00:00Z", day)))
                .unwrap();
        }

        sub.force_close_after_grace().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    // Tier change

    #[test]
    fn change_tier_reprices() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        let new_tier = TierId::new();
        sub.change_tier(TierChange {
            tier_id: new_tier,
            price_paid: 199_900,
            discount_applied: 0,
            gateway_plan_id: Some("plan_pro".to_string()),
        })
        .unwrap();

        assert_eq!(sub.tier_id, new_tier);
        assert_eq!(sub.final_price, 199_900);
        assert_eq!(sub.gateway_plan_id, Some("plan_pro".to_string()));
    }

    #[test]
    fn change_tier_on_suspended_fails() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        sub.pause().unwrap();
        let result = sub.change_tier(TierChange {
            tier_id: TierId::new(),
            price_paid: 199_900,
            discount_applied: 0,
            gateway_plan_id: None,
        });
        assert!(result.is_err());
    }

    // Access / tombstone

    #[test]
    fn only_active_non_deleted_has_access() {
        let mut sub = active_subscription(BillingCycle::Monthly);
        assert!(sub.has_access());

        sub.mark_deleted();
        assert!(!sub.has_access());
    }
}
