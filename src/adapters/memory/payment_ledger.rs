//! In-memory PaymentLedger for tests and local runs.

use crate::domain::foundation::{
    AnalystId, DomainError, ErrorCode, Timestamp, TraderId, TransactionId,
};
use crate::domain::ledger::{
    NewPaymentTransaction, PaymentTransaction, RefundNote, TransactionStatus, TransactionType,
};
use crate::ports::{LedgerStats, PaymentLedger, RecordOutcome};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Vec-backed ledger with the same idempotency contract as the Postgres
/// adapter: the gateway payment id is unique, and re-recording it returns
/// the existing row untouched.
#[derive(Clone, Default)]
pub struct InMemoryPaymentLedger {
    rows: Arc<Mutex<Vec<PaymentTransaction>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct snapshot for assertions.
    pub fn snapshot(&self) -> Vec<PaymentTransaction> {
        self.rows.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn rows(&self) -> Arc<Mutex<Vec<PaymentTransaction>>> {
        self.rows.clone()
    }
}

/// Shared insert-or-return-existing used by both the ledger and the
/// in-memory billing store.
pub(crate) fn record_locked(
    rows: &mut Vec<PaymentTransaction>,
    transaction: NewPaymentTransaction,
) -> RecordOutcome {
    if let Some(existing) = rows
        .iter()
        .find(|t| t.gateway_payment_id == transaction.gateway_payment_id)
    {
        return RecordOutcome::Duplicate(existing.clone());
    }
    let row = transaction.into_transaction(TransactionId::new(), Timestamp::now());
    rows.push(row.clone());
    RecordOutcome::Recorded(row)
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn record(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<RecordOutcome, DomainError> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        Ok(record_locked(&mut rows, transaction))
    }

    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .find(|t| t.gateway_payment_id == gateway_payment_id)
            .cloned())
    }

    async fn annotate_refund(
        &self,
        gateway_payment_id: &str,
        note: RefundNote,
    ) -> Result<PaymentTransaction, DomainError> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        let row = rows
            .iter_mut()
            .find(|t| t.gateway_payment_id == gateway_payment_id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::TransactionNotFound, "Transaction not found")
            })?;

        row.annotate_refund(note)
            .map_err(|e| DomainError::new(ErrorCode::ValidationFailed, e.to_string()))?;
        Ok(row.clone())
    }

    async fn captured_revenue(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        Ok(rows
            .iter()
            .filter(|t| {
                &t.analyst_id == analyst_id
                    && t.status == TransactionStatus::Captured
                    && matches!(
                        t.transaction_type,
                        TransactionType::SubscriptionPayment | TransactionType::Renewal
                    )
                    && !t.created_at.is_before(&from)
                    && !t.created_at.is_after(&to)
            })
            .map(|t| t.amount)
            .sum())
    }

    async fn list_for_trader(
        &self,
        trader_id: &TraderId,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        let mut out: Vec<_> = rows
            .iter()
            .filter(|t| t.trader_id.as_ref() == Some(trader_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn list_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let rows = self.rows.lock().expect("lock poisoned");
        let mut out: Vec<_> = rows
            .iter()
            .filter(|t| {
                &t.analyst_id == analyst_id
                    && !t.created_at.is_before(&from)
                    && !t.created_at.is_after(&to)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn stats_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<LedgerStats, DomainError> {
        let rows = self.list_for_analyst(analyst_id, from, to).await?;

        let captured: Vec<_> = rows
            .iter()
            .filter(|t| t.status == TransactionStatus::Captured)
            .collect();
        let failed = rows
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .count() as u64;

        let captured_count = captured.len() as u64;
        let total_captured: i64 = captured.iter().map(|t| t.amount).sum();
        let attempts = captured_count + failed;

        Ok(LedgerStats {
            transaction_count: rows.len() as u64,
            captured_count,
            failed_count: failed,
            total_captured,
            success_rate: if attempts == 0 {
                0.0
            } else {
                captured_count as f64 / attempts as f64
            },
            average_amount: if captured_count == 0 {
                0
            } else {
                total_captured / captured_count as i64
            },
        })
    }
}
