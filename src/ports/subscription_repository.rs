//! Subscription repository port (write side).
//!
//! Defines the contract for persisting and retrieving Subscription
//! aggregates, plus the sweep queries the scheduler runs.
//!
//! # Design
//!
//! - **One active per pair**: enforced via `find_active_for_pair` before
//!   creation; cancelled/expired rows coexist freely
//! - **Tombstones excluded**: every query skips `deleted` rows
//! - **Row is the lock unit**: implementations serialize concurrent
//!   updates on the subscription row

use crate::domain::foundation::{
    AnalystId, DiscountCodeId, DomainError, SubscriptionId, TierId, Timestamp, TraderId,
};
use crate::domain::subscription::Subscription;
use async_trait::async_trait;

/// Repository port for Subscription aggregate persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Save a new subscription.
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the row doesn't exist
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Find by platform id.
    async fn find_by_id(&self, id: &SubscriptionId)
        -> Result<Option<Subscription>, DomainError>;

    /// Find by the gateway's subscription id.
    ///
    /// This is the lookup webhooks use; a `None` here is a fatal
    /// event-processing error for the caller.
    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The currently-active subscription for a (trader, analyst) pair,
    /// if any. At most one may exist.
    async fn find_active_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Whether the trader ever held a subscription with this analyst
    /// (any status). Used by the first-time-subscriber discount check.
    async fn has_any_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<bool, DomainError>;

    /// Count of currently-active subscriptions on a tier, for the
    /// capacity check at creation time.
    async fn count_active_on_tier(&self, tier_id: &TierId) -> Result<u64, DomainError>;

    /// Historical subscriptions by this trader that redeemed the given
    /// discount code. Used by the per-user limit check.
    async fn count_discount_uses(
        &self,
        discount_code_id: &DiscountCodeId,
        trader_id: &TraderId,
    ) -> Result<u32, DomainError>;

    /// Payment retry sweep: suspended/pending subscriptions with retry
    /// budget left whose last attempt was at or before `attempted_before`.
    async fn due_for_payment_retry(
        &self,
        attempted_before: Timestamp,
        max_retries: u32,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Expiry sweep: active subscriptions whose `expires_at` has already
    /// passed (the renewal webhook never arrived).
    async fn lapsed_active(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError>;

    /// Grace sweep: suspended subscriptions whose grace deadline has
    /// passed without recovery.
    async fn grace_elapsed(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError>;
}
