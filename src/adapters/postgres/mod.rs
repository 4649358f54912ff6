//! PostgreSQL adapters.

mod billing_store;
mod catalog;
mod payment_ledger;
mod subscription_repository;
mod webhook_inbox;

pub use billing_store::PostgresBillingStore;
pub use catalog::PostgresCatalogRepository;
pub use payment_ledger::PostgresPaymentLedger;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_inbox::PostgresWebhookInbox;
