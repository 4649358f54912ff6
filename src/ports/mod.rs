//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Subscription aggregate persistence + sweeps
//! - `PaymentLedger` - idempotent money-movement ledger
//! - `BillingStore` - atomic transition + ledger insert
//! - `CatalogRepository` - tiers and discount codes
//!
//! ## Integration Ports
//!
//! - `PaymentGateway` - injected external gateway client
//! - `WebhookInbox` - durable inbound event store (idempotency + redelivery)
//! - `EventPublisher` - domain event fan-out

mod billing_store;
mod catalog_repository;
mod event_publisher;
mod payment_gateway;
mod payment_ledger;
mod subscription_repository;
mod webhook_inbox;

pub use billing_store::{ApplyOutcome, BillingStore};
pub use catalog_repository::CatalogRepository;
pub use event_publisher::EventPublisher;
pub use payment_gateway::{
    CreateCustomerRequest, CreateGatewaySubscriptionRequest, CreatePlanRequest, GatewayCustomer,
    GatewayError, GatewayErrorCode, GatewayPlan, GatewayRefund, GatewaySubscriptionHandle,
    GatewayTransfer, PaymentGateway, TransferRequest,
};
pub use payment_ledger::{LedgerStats, PaymentLedger, RecordOutcome};
pub use subscription_repository::SubscriptionRepository;
pub use webhook_inbox::{InboxRecord, InboxStatus, SaveOutcome, WebhookInbox};
