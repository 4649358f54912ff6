//! BillingStore port - atomic state transition plus ledger insert.
//!
//! Every webhook-driven transition mutates exactly two things: the
//! subscription row and the payment ledger. Both must commit or neither;
//! a ledger row without its matching transition (or vice versa) is a
//! reconciliation incident.
//!
//! ## Concurrency contract
//!
//! Implementations must:
//! - lock the subscription row for the duration of the transaction
//!   (`SELECT ... FOR UPDATE`), so two deliveries for the same
//!   subscription serialize on the row
//! - treat a unique-constraint rejection on the gateway payment id as
//!   `ApplyOutcome::DuplicatePayment` and roll back the subscription
//!   update: the race loser's transition must not survive

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::ledger::NewPaymentTransaction;
use crate::domain::subscription::Subscription;

/// Result of an atomic apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Transition and ledger row committed together.
    Applied,
    /// The ledger already had this gateway payment id; nothing changed.
    DuplicatePayment,
}

/// Port for committing a subscription transition and its ledger row in a
/// single database transaction.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Persist the (already-transitioned) subscription together with the
    /// ledger row describing the money movement that caused it.
    async fn apply(
        &self,
        subscription: &Subscription,
        transaction: &NewPaymentTransaction,
    ) -> Result<ApplyOutcome, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn BillingStore) {}
    }

    #[test]
    fn apply_outcome_equality() {
        assert_eq!(ApplyOutcome::Applied, ApplyOutcome::Applied);
        assert_ne!(ApplyOutcome::Applied, ApplyOutcome::DuplicatePayment);
    }
}
