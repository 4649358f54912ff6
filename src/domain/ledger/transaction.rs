//! Payment ledger rows.
//!
//! One row per money-movement event (charge, failure, payout). Rows are
//! immutable once written; the single exception is refund annotation on the
//! original captured charge. The gateway payment id is the idempotency key:
//! at most one row exists per id regardless of how many times its webhook
//! is delivered.

use crate::domain::foundation::{
    AnalystId, SubscriptionId, Timestamp, TraderId, TransactionId, ValidationError,
};
use serde::{Deserialize, Serialize};

/// What kind of money movement a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// First charge of a new subscription.
    SubscriptionPayment,
    /// Recurring charge extending an existing subscription.
    Renewal,
    /// Money returned to the trader.
    Refund,
    /// Revenue share transferred to the analyst.
    Payout,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SubscriptionPayment => "subscription_payment",
            TransactionType::Renewal => "renewal",
            TransactionType::Refund => "refund",
            TransactionType::Payout => "payout",
        }
    }
}

/// Settlement state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Authorized => "authorized",
            TransactionStatus::Captured => "captured",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

/// A persisted payment ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    /// Null for payouts.
    pub subscription_id: Option<SubscriptionId>,
    pub trader_id: Option<TraderId>,
    pub analyst_id: AnalystId,
    /// The gateway's payment (or transfer) identifier. Unique.
    pub gateway_payment_id: String,
    pub transaction_type: TransactionType,
    /// Amount in paise.
    pub amount: i64,
    pub status: TransactionStatus,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    /// Subscription retry counter at the time this row was written.
    pub retry_count: u32,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub payout_amount: Option<i64>,
    pub commission_amount: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl PaymentTransaction {
    /// Annotates a captured charge with its refund.
    ///
    /// The only in-place mutation the ledger permits.
    ///
    /// # Errors
    ///
    /// Returns error if the row is not a captured charge or the refund
    /// exceeds the charged amount.
    pub fn annotate_refund(&mut self, note: RefundNote) -> Result<(), ValidationError> {
        if self.status != TransactionStatus::Captured {
            return Err(ValidationError::invalid_format(
                "refund",
                format!("cannot refund a {} transaction", self.status.as_str()),
            ));
        }
        if note.amount <= 0 || note.amount > self.amount {
            return Err(ValidationError::out_of_range(
                "refund_amount",
                1,
                self.amount,
                note.amount,
            ));
        }
        self.status = TransactionStatus::Refunded;
        self.refund_amount = Some(note.amount);
        self.refund_reason = note.reason;
        Ok(())
    }
}

/// Refund annotation applied to an existing captured charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundNote {
    pub amount: i64,
    pub reason: Option<String>,
}

/// Insert payload for a new ledger row.
///
/// Constructed through the typed helpers below; handlers never assemble
/// column maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentTransaction {
    pub subscription_id: Option<SubscriptionId>,
    pub trader_id: Option<TraderId>,
    pub analyst_id: AnalystId,
    pub gateway_payment_id: String,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub status: TransactionStatus,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
    pub payout_amount: Option<i64>,
    pub commission_amount: Option<i64>,
    pub metadata: serde_json::Value,
}

impl NewPaymentTransaction {
    /// A captured charge (first payment or renewal).
    pub fn captured_charge(
        subscription_id: SubscriptionId,
        trader_id: TraderId,
        analyst_id: AnalystId,
        transaction_type: TransactionType,
        gateway_payment_id: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            subscription_id: Some(subscription_id),
            trader_id: Some(trader_id),
            analyst_id,
            gateway_payment_id: gateway_payment_id.into(),
            transaction_type,
            amount,
            status: TransactionStatus::Captured,
            failure_code: None,
            failure_reason: None,
            retry_count: 0,
            payout_amount: None,
            commission_amount: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// A failed charge attempt.
    pub fn failed_charge(
        subscription_id: SubscriptionId,
        trader_id: TraderId,
        analyst_id: AnalystId,
        gateway_payment_id: impl Into<String>,
        amount: i64,
        retry_count: u32,
        failure_code: Option<String>,
        failure_reason: Option<String>,
    ) -> Self {
        Self {
            subscription_id: Some(subscription_id),
            trader_id: Some(trader_id),
            analyst_id,
            gateway_payment_id: gateway_payment_id.into(),
            transaction_type: TransactionType::SubscriptionPayment,
            amount,
            status: TransactionStatus::Failed,
            failure_code,
            failure_reason,
            retry_count,
            payout_amount: None,
            commission_amount: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// A payout transfer to the analyst, keyed by the transfer provider's
    /// identifier.
    pub fn payout(
        analyst_id: AnalystId,
        gateway_transfer_id: impl Into<String>,
        gross_revenue: i64,
        commission: i64,
        net_payout: i64,
    ) -> Self {
        Self {
            subscription_id: None,
            trader_id: None,
            analyst_id,
            gateway_payment_id: gateway_transfer_id.into(),
            transaction_type: TransactionType::Payout,
            amount: gross_revenue,
            status: TransactionStatus::Captured,
            failure_code: None,
            failure_reason: None,
            retry_count: 0,
            payout_amount: Some(net_payout),
            commission_amount: Some(commission),
            metadata: serde_json::Value::Null,
        }
    }

    /// Materializes the insert payload into a full row.
    pub fn into_transaction(self, id: TransactionId, created_at: Timestamp) -> PaymentTransaction {
        PaymentTransaction {
            id,
            subscription_id: self.subscription_id,
            trader_id: self.trader_id,
            analyst_id: self.analyst_id,
            gateway_payment_id: self.gateway_payment_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            status: self.status,
            failure_code: self.failure_code,
            failure_reason: self.failure_reason,
            retry_count: self.retry_count,
            refund_amount: None,
            refund_reason: None,
            payout_amount: self.payout_amount,
            commission_amount: self.commission_amount,
            metadata: self.metadata,
            created_at,
        }
    }
}
