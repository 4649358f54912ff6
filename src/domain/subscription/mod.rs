//! Subscription lifecycle domain.
//!
//! The `Subscription` aggregate owns the `pending_payment → active ⇄
//! suspended → cancelled` lifecycle (plus `active → expired`). All
//! transitions go through typed inputs; webhook handlers and user actions
//! never patch fields directly.

mod aggregate;
mod billing_cycle;
mod errors;
mod events;
mod status;

pub use aggregate::{
    CancelMode, ChargeFailure, FailureOutcome, FirstCharge, RenewalCharge, Subscription,
    TierChange, GRACE_PERIOD_DAYS, MAX_PAYMENT_RETRIES,
};
pub use billing_cycle::BillingCycle;
pub use errors::SubscriptionError;
pub use events::{ExpiryReason, SubscriptionEvent, SuspensionReason};
pub use status::SubscriptionStatus;
