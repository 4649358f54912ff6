//! In-memory SubscriptionRepository for tests and local runs.

use crate::domain::foundation::{
    AnalystId, DiscountCodeId, DomainError, ErrorCode, SubscriptionId, TierId, Timestamp, TraderId,
};
use crate::domain::subscription::{Subscription, SubscriptionStatus, MAX_PAYMENT_RETRIES};
use crate::ports::SubscriptionRepository;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Vec-backed repository. Mirrors the Postgres adapter's query semantics,
/// including tombstone exclusion.
#[derive(Clone, Default)]
pub struct InMemorySubscriptionRepository {
    rows: Arc<Mutex<Vec<Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct snapshot for assertions.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.rows.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn rows(&self) -> Arc<Mutex<Vec<Subscription>>> {
        self.rows.clone()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        if rows.iter().any(|s| s.id == subscription.id) {
            return Err(DomainError::new(
                ErrorCode::DuplicateSubscription,
                "Subscription id already exists",
            ));
        }
        rows.push(subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        match rows.iter_mut().find(|s| s.id == subscription.id) {
            Some(row) => {
                *row = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            )),
        }
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows.iter().find(|s| &s.id == id && !s.deleted).cloned())
    }

    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .find(|s| {
                s.gateway_subscription_id.as_deref() == Some(gateway_subscription_id) && !s.deleted
            })
            .cloned())
    }

    async fn find_active_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .find(|s| {
                &s.trader_id == trader_id
                    && &s.analyst_id == analyst_id
                    && s.status == SubscriptionStatus::Active
                    && !s.deleted
            })
            .cloned())
    }

    async fn has_any_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<bool, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .any(|s| &s.trader_id == trader_id && &s.analyst_id == analyst_id && !s.deleted))
    }

    async fn count_active_on_tier(&self, tier_id: &TierId) -> Result<u64, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|s| {
                &s.tier_id == tier_id && s.status == SubscriptionStatus::Active && !s.deleted
            })
            .count() as u64)
    }

    async fn count_discount_uses(
        &self,
        discount_code_id: &DiscountCodeId,
        trader_id: &TraderId,
    ) -> Result<u32, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|s| {
                s.discount_code_id.as_ref() == Some(discount_code_id)
                    && &s.trader_id == trader_id
                    && !s.deleted
            })
            .count() as u32)
    }

    async fn due_for_payment_retry(
        &self,
        attempted_before: Timestamp,
        max_retries: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    SubscriptionStatus::Suspended | SubscriptionStatus::PendingPayment
                ) && s.payment_retry_count < max_retries.min(MAX_PAYMENT_RETRIES)
                    && s.updated_at <= attempted_before
                    && !s.deleted
            })
            .cloned()
            .collect())
    }

    async fn lapsed_active(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && s.expires_at.map(|e| e.is_before(&as_of)).unwrap_or(false)
                    && !s.deleted
            })
            .cloned()
            .collect())
    }

    async fn grace_elapsed(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|s| {
                s.status == SubscriptionStatus::Suspended
                    && s.grace_period_ends_at
                        .map(|g| g.is_before(&as_of))
                        .unwrap_or(false)
                    && !s.deleted
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{BillingCycle, FirstCharge};

    fn subscription() -> Subscription {
        Subscription::checkout(
            SubscriptionId::new(),
            TraderId::new(),
            AnalystId::new(),
            TierId::new(),
            BillingCycle::Monthly,
            99_900,
            0,
            None,
        )
    }

    #[tokio::test]
    async fn save_then_find_roundtrips() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = subscription();

        repo.save(&sub).await.unwrap();
        let found = repo.find_by_id(&sub.id).await.unwrap();

        assert_eq!(found.map(|s| s.id), Some(sub.id));
    }

    #[tokio::test]
    async fn duplicate_save_rejected() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = subscription();

        repo.save(&sub).await.unwrap();
        assert!(repo.save(&sub).await.is_err());
    }

    #[tokio::test]
    async fn update_missing_row_errors() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = subscription();
        let result = repo.update(&sub).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn active_pair_lookup_ignores_terminal_rows() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = subscription();
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_1".to_string(),
            amount: 99_900,
            occurred_at: Timestamp::now(),
        })
        .unwrap();
        repo.save(&sub).await.unwrap();

        let found = repo
            .find_active_for_pair(&sub.trader_id, &sub.analyst_id)
            .await
            .unwrap();
        assert!(found.is_some());

        let mut cancelled = sub.clone();
        cancelled
            .cancel(crate::domain::subscription::CancelMode::Immediate)
            .unwrap();
        repo.update(&cancelled).await.unwrap();

        let found = repo
            .find_active_for_pair(&sub.trader_id, &sub.analyst_id)
            .await
            .unwrap();
        assert!(found.is_none());

        // But history still counts for the first-time check
        assert!(repo
            .has_any_for_pair(&sub.trader_id, &sub.analyst_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn tombstoned_rows_are_invisible() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = subscription();
        repo.save(&sub).await.unwrap();

        sub.mark_deleted();
        repo.update(&sub).await.unwrap();

        assert!(repo.find_by_id(&sub.id).await.unwrap().is_none());
        assert!(!repo
            .has_any_for_pair(&sub.trader_id, &sub.analyst_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn lapsed_active_selects_past_expiry_only() {
        let repo = InMemorySubscriptionRepository::new();

        let mut lapsed = subscription();
        lapsed
            .activate(&FirstCharge {
                gateway_payment_id: "pay_a".to_string(),
                amount: 99_900,
                occurred_at: Timestamp::now(),
            })
            .unwrap();
        lapsed.expires_at = Some(Timestamp::now().minus_days(1));
        repo.save(&lapsed).await.unwrap();

        let mut current = subscription();
        current
            .activate(&FirstCharge {
                gateway_payment_id: "pay_b".to_string(),
                amount: 99_900,
                occurred_at: Timestamp::now(),
            })
            .unwrap();
        repo.save(&current).await.unwrap();

        let due = repo.lapsed_active(Timestamp::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, lapsed.id);
    }
}
