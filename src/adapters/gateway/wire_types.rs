//! Wire types for the gateway's REST API.
//!
//! Request/response DTOs for the subset of the gateway API this engine
//! calls. Field names follow the provider's JSON schema; domain types
//! never leak into this module's structs.

use serde::{Deserialize, Serialize};

/// POST /plans
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
    /// "monthly" | "yearly"
    pub period: String,
    /// Cycles per charge; always 1 for this platform.
    pub interval: u32,
    pub item: PlanItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    pub name: String,
    /// Paise.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    pub id: String,
}

/// POST /customers
#[derive(Debug, Clone, Serialize)]
pub struct CustomerRequest {
    pub name: Option<String>,
    pub email: String,
    /// "0" asks the gateway to return the existing customer instead of
    /// erroring on a duplicate email.
    pub fail_existing: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerResponse {
    pub id: String,
    pub email: String,
}

/// POST /subscriptions
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    pub plan_id: String,
    pub customer_id: String,
    pub total_count: u32,
    pub customer_notify: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub short_url: Option<String>,
}

/// POST /subscriptions/{id}/cancel
#[derive(Debug, Clone, Serialize)]
pub struct CancelRequest {
    pub cancel_at_cycle_end: u8,
}

/// POST /payments/{id}/refund
#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    /// Paise. Omitted for full refunds; this engine always sends it.
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: String,
}

/// POST /transfers
#[derive(Debug, Clone, Serialize)]
pub struct TransferWireRequest {
    /// Linked account identifier.
    pub account: String,
    /// Paise.
    pub amount: i64,
    pub currency: String,
    /// Platform-side reference for reconciliation.
    pub notes: TransferNotes,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferNotes {
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferResponse {
    pub id: String,
    pub amount: i64,
}

/// Error body returned by the gateway on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
