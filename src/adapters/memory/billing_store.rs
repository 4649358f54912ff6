//! In-memory BillingStore: atomic transition + ledger insert.
//!
//! Serializes applies behind one mutex, mirroring the row lock +
//! unique-constraint behavior of the Postgres implementation: the race
//! loser's subscription update is discarded along with its ledger row.

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::ledger::NewPaymentTransaction;
use crate::domain::subscription::Subscription;
use crate::ports::{ApplyOutcome, BillingStore, RecordOutcome};
use async_trait::async_trait;
use std::sync::Mutex;

use super::payment_ledger::record_locked;
use super::{InMemoryPaymentLedger, InMemorySubscriptionRepository};

/// Couples the in-memory repository and ledger into one atomic apply.
pub struct InMemoryBillingStore {
    subscriptions: InMemorySubscriptionRepository,
    ledger: InMemoryPaymentLedger,
    /// Serializes the check-then-write section.
    apply_lock: Mutex<()>,
}

impl InMemoryBillingStore {
    pub fn new(
        subscriptions: InMemorySubscriptionRepository,
        ledger: InMemoryPaymentLedger,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            apply_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn apply(
        &self,
        subscription: &Subscription,
        transaction: &NewPaymentTransaction,
    ) -> Result<ApplyOutcome, DomainError> {
        let _guard = self.apply_lock.lock().expect("lock poisoned");

        // Ledger insert decides the race; a duplicate aborts the whole
        // apply, so the losing transition never lands.
        let ledger_rows = self.ledger.rows();
        let mut rows = ledger_rows.lock().expect("lock poisoned");
        match record_locked(&mut rows, transaction.clone()) {
            RecordOutcome::Duplicate(_) => return Ok(ApplyOutcome::DuplicatePayment),
            RecordOutcome::Recorded(recorded) => {
                let subs = self.subscriptions.rows();
                let mut subs = subs.lock().expect("lock poisoned");
                match subs.iter_mut().find(|s| s.id == subscription.id) {
                    Some(row) => {
                        *row = subscription.clone();
                        Ok(ApplyOutcome::Applied)
                    }
                    None => {
                        // Roll the ledger row back; nothing may half-commit
                        rows.retain(|t| t.id != recorded.id);
                        Err(DomainError::new(
                            ErrorCode::SubscriptionNotFound,
                            "Subscription not found",
                        ))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AnalystId, SubscriptionId, TierId, TraderId};
    use crate::domain::ledger::TransactionType;
    use crate::domain::subscription::{BillingCycle, FirstCharge, SubscriptionStatus};
    use crate::domain::foundation::Timestamp;
    use crate::ports::SubscriptionRepository;
    use std::sync::Arc;

    fn pending() -> Subscription {
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

    fn charge_for(sub: &Subscription, payment_id: &str) -> NewPaymentTransaction {
        NewPaymentTransaction::captured_charge(
            sub.id,
            sub.trader_id,
            sub.analyst_id,
            TransactionType::SubscriptionPayment,
            payment_id,
            sub.final_price,
        )
    }

    #[tokio::test]
    async fn apply_commits_transition_and_ledger_row_together() {
        let repo = InMemorySubscriptionRepository::new();
        let ledger = InMemoryPaymentLedger::new();
        let store = InMemoryBillingStore::new(repo.clone(), ledger.clone());

        let mut sub = pending();
        repo.save(&sub).await.unwrap();
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_1".to_string(),
            amount: sub.final_price,
            occurred_at: Timestamp::now(),
        })
        .unwrap();

        let outcome = store.apply(&sub, &charge_for(&sub, "pay_1")).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            repo.find_by_id(&sub.id).await.unwrap().unwrap().status,
            SubscriptionStatus::Active
        );
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_payment_aborts_the_transition() {
        let repo = InMemorySubscriptionRepository::new();
        let ledger = InMemoryPaymentLedger::new();
        let store = InMemoryBillingStore::new(repo.clone(), ledger.clone());

        let mut sub = pending();
        repo.save(&sub).await.unwrap();
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_1".to_string(),
            amount: sub.final_price,
            occurred_at: Timestamp::now(),
        })
        .unwrap();
        store.apply(&sub, &charge_for(&sub, "pay_1")).await.unwrap();

        // Second apply with the same payment id: ledger count stays 1
        let outcome = store.apply(&sub, &charge_for(&sub, "pay_1")).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::DuplicatePayment);
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn missing_subscription_rolls_back_ledger_row() {
        let repo = InMemorySubscriptionRepository::new();
        let ledger = InMemoryPaymentLedger::new();
        let store = InMemoryBillingStore::new(repo.clone(), ledger.clone());

        let sub = pending(); // Never saved
        let result = store.apply(&sub, &charge_for(&sub, "pay_x")).await;

        assert!(result.is_err());
        assert!(ledger.snapshot().is_empty());
    }

    #[tokio::test]
    async fn concurrent_identical_applies_produce_one_ledger_row() {
        let repo = InMemorySubscriptionRepository::new();
        let ledger = InMemoryPaymentLedger::new();
        let store = Arc::new(InMemoryBillingStore::new(repo.clone(), ledger.clone()));

        let mut sub = pending();
        repo.save(&sub).await.unwrap();
        sub.activate(&FirstCharge {
            gateway_payment_id: "pay_race".to_string(),
            amount: sub.final_price,
            occurred_at: Timestamp::now(),
        })
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let sub = sub.clone();
            let txn = charge_for(&sub, "pay_race");
            handles.push(tokio::spawn(async move { store.apply(&sub, &txn).await }));
        }

        let mut applied = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ApplyOutcome::Applied => applied += 1,
                ApplyOutcome::DuplicatePayment => duplicates += 1,
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(ledger.snapshot().len(), 1);
    }
}
