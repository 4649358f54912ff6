//! PaymentLedger port - append-mostly store of payment attempts.
//!
//! The gateway payment id is the idempotency key: `record` either inserts
//! a new row or returns the existing one unchanged. The uniqueness
//! constraint in storage is the true safety mechanism; any pre-check is an
//! optimization only, and a genuine race must surface as a successful
//! no-op, never an error.

use async_trait::async_trait;

use crate::domain::foundation::{AnalystId, DomainError, Timestamp, TraderId};
use crate::domain::ledger::{NewPaymentTransaction, PaymentTransaction, RefundNote};

/// Result of an idempotent ledger insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new row was written.
    Recorded(PaymentTransaction),
    /// The gateway payment id already had a row; nothing was written.
    Duplicate(PaymentTransaction),
}

impl RecordOutcome {
    /// The row, whether freshly written or pre-existing.
    pub fn transaction(&self) -> &PaymentTransaction {
        match self {
            RecordOutcome::Recorded(t) | RecordOutcome::Duplicate(t) => t,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RecordOutcome::Duplicate(_))
    }
}

/// Derived reporting statistics for an analyst over a date range.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LedgerStats {
    pub transaction_count: u64,
    pub captured_count: u64,
    pub failed_count: u64,
    /// Sum of captured charge amounts, in paise.
    pub total_captured: i64,
    /// captured / (captured + failed), 0.0 when there were no attempts.
    pub success_rate: f64,
    /// Mean captured charge, in paise. 0 when there were none.
    pub average_amount: i64,
}

/// Port for the payment ledger.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Idempotent insert keyed on the gateway payment id.
    ///
    /// The existence check and the insert happen inside the same storage
    /// transaction; a unique-constraint rejection is returned as
    /// `RecordOutcome::Duplicate`, not as an error.
    async fn record(&self, transaction: NewPaymentTransaction)
        -> Result<RecordOutcome, DomainError>;

    /// Look up a row by gateway payment id.
    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError>;

    /// Annotate a captured charge with its refund. The only in-place
    /// update the ledger permits.
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` if no row exists for the payment id
    async fn annotate_refund(
        &self,
        gateway_payment_id: &str,
        note: RefundNote,
    ) -> Result<PaymentTransaction, DomainError>;

    /// Sum of captured subscription_payment/renewal amounts for an analyst
    /// over a date range. Input to the payout calculator.
    async fn captured_revenue(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError>;

    /// All rows for a trader, newest first. Reporting only.
    async fn list_for_trader(
        &self,
        trader_id: &TraderId,
    ) -> Result<Vec<PaymentTransaction>, DomainError>;

    /// All rows for an analyst over a date range, newest first.
    async fn list_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PaymentTransaction>, DomainError>;

    /// Derived statistics for an analyst over a date range.
    async fn stats_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<LedgerStats, DomainError>;
}
