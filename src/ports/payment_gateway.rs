//! PaymentGateway port - injected client for the external payment gateway.
//!
//! Defines the contract for recurring-billing gateway integrations so the
//! engine is testable with a fake implementation; there is no hidden
//! global SDK state.
//!
//! # Design
//!
//! - **Gateway agnostic**: the interface carries no provider SDK types
//! - **Bounded timeouts**: every call uses a short timeout; a timeout is
//!   "outcome unknown", reconciled by the next webhook or scheduler sweep
//! - **Idempotent**: operations can be safely retried

use crate::domain::foundation::{AnalystId, TraderId};
use crate::domain::subscription::{BillingCycle, SubscriptionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for payment gateway integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a billing plan for a tier + cycle combination.
    async fn create_plan(&self, request: CreatePlanRequest) -> Result<GatewayPlan, GatewayError>;

    /// Create a customer record in the gateway.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError>;

    /// Create a recurring subscription on a plan.
    async fn create_subscription(
        &self,
        request: CreateGatewaySubscriptionRequest,
    ) -> Result<GatewaySubscriptionHandle, GatewayError>;

    /// Fetch the gateway's current view of a subscription.
    async fn fetch_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<GatewaySubscriptionHandle>, GatewayError>;

    /// Cancel a subscription, immediately or at cycle end.
    async fn cancel_subscription(
        &self,
        gateway_subscription_id: &str,
        at_cycle_end: bool,
    ) -> Result<GatewaySubscriptionHandle, GatewayError>;

    /// Pause recurring charges.
    async fn pause_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError>;

    /// Resume recurring charges.
    async fn resume_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError>;

    /// Ask the gateway to retry the outstanding charge.
    ///
    /// The outcome arrives asynchronously as a webhook; this call only
    /// schedules the attempt.
    async fn retry_charge(&self, gateway_subscription_id: &str) -> Result<(), GatewayError>;

    /// Refund a captured payment, fully or partially.
    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: i64,
    ) -> Result<GatewayRefund, GatewayError>;

    /// Transfer funds to an analyst's linked account.
    ///
    /// The returned transfer id is the idempotency key for the payout
    /// ledger row.
    async fn transfer(&self, request: TransferRequest) -> Result<GatewayTransfer, GatewayError>;
}

/// Request to create a billing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub analyst_id: AnalystId,
    /// Display name shown on the gateway's checkout page.
    pub name: String,
    pub billing_cycle: BillingCycle,
    /// Per-cycle amount in paise.
    pub amount: i64,
}

/// A billing plan in the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPlan {
    pub id: String,
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub trader_id: TraderId,
    pub email: String,
    pub name: Option<String>,
}

/// A customer in the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
    pub email: String,
}

/// Request to create a recurring subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGatewaySubscriptionRequest {
    pub plan_id: String,
    pub customer_id: String,
    /// Number of billing cycles before the subscription completes.
    pub total_cycles: u32,
}

/// The gateway's view of a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscriptionHandle {
    pub id: String,
    pub status: String,
    /// Hosted checkout URL for the first charge, when applicable.
    pub short_url: Option<String>,
}

/// A refund issued through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: String,
}

/// Request to transfer an analyst's payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub analyst_id: AnalystId,
    /// The analyst's linked account at the transfer provider.
    pub linked_account_id: String,
    /// Net amount in paise.
    pub amount: i64,
    /// Platform-side reference (e.g. payout period) for audit.
    pub reference: String,
}

/// A completed transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransfer {
    pub id: String,
    pub amount: i64,
}

/// Errors from gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    /// The gateway's own error code, when it sent one.
    pub provider_code: Option<String>,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Whether the scheduler may retry this operation later.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Gateway error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Connectivity failure before a response arrived.
    Network,
    /// The bounded timeout elapsed; the outcome is unknown.
    Timeout,
    /// API credentials rejected.
    Authentication,
    /// The gateway rejected the request as malformed.
    InvalidRequest,
    /// Referenced resource does not exist at the gateway.
    NotFound,
    /// Rate limit hit.
    RateLimited,
    /// The gateway reported an internal error (5xx).
    Provider,
    Unknown,
}

impl GatewayErrorCode {
    /// Transient errors the scheduler retries; never immediate re-throw.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::Network
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::RateLimited
                | GatewayErrorCode::Provider
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::Network => "network",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::Authentication => "authentication",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimited => "rate_limited",
            GatewayErrorCode::Provider => "provider",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl From<GatewayError> for SubscriptionError {
    fn from(err: GatewayError) -> Self {
        match err.code {
            // Outcome unknown: reconciled by webhook or sweep, never
            // assumed failed
            GatewayErrorCode::Timeout => SubscriptionError::GatewayOutcomeUnknown,
            _ => SubscriptionError::Gateway(err.message),
        }
    }
}
