//! Payout handlers - compute and settle analyst revenue shares.
//!
//! `CalculatePayoutHandler` is a pure read: it sums captured subscription
//! revenue from the ledger and splits it at the fixed platform
//! commission. `RecordPayoutHandler` performs the actual transfer and
//! writes one idempotent `payout` ledger row keyed by the transfer
//! provider's identifier.

use std::sync::Arc;

use crate::domain::foundation::{AnalystId, Timestamp};
use crate::domain::ledger::{NewPaymentTransaction, PayoutStatement};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{PaymentGateway, PaymentLedger, TransferRequest};

/// Query for an analyst's revenue split over a date range.
#[derive(Debug, Clone)]
pub struct CalculatePayoutQuery {
    pub analyst_id: AnalystId,
    pub from: Timestamp,
    pub to: Timestamp,
}

/// Handler computing payout statements. Read-only.
pub struct CalculatePayoutHandler {
    ledger: Arc<dyn PaymentLedger>,
}

impl CalculatePayoutHandler {
    pub fn new(ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: CalculatePayoutQuery,
    ) -> Result<PayoutStatement, SubscriptionError> {
        let total_revenue = self
            .ledger
            .captured_revenue(&query.analyst_id, query.from, query.to)
            .await?;

        Ok(PayoutStatement::compute(
            query.analyst_id,
            query.from,
            query.to,
            total_revenue,
        ))
    }
}

/// Command to transfer an analyst's payout for a period.
#[derive(Debug, Clone)]
pub struct RecordPayoutCommand {
    pub analyst_id: AnalystId,
    pub from: Timestamp,
    pub to: Timestamp,
    /// The analyst's linked account at the transfer provider.
    pub linked_account_id: String,
}

/// Result of a settled payout.
#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub statement: PayoutStatement,
    pub gateway_transfer_id: String,
    /// False when the transfer's ledger row already existed.
    pub newly_recorded: bool,
}

/// Handler performing the funds transfer and its ledger record.
pub struct RecordPayoutHandler {
    ledger: Arc<dyn PaymentLedger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RecordPayoutHandler {
    pub fn new(ledger: Arc<dyn PaymentLedger>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ledger, gateway }
    }

    pub async fn handle(&self, cmd: RecordPayoutCommand) -> Result<PayoutReceipt, SubscriptionError> {
        let total_revenue = self
            .ledger
            .captured_revenue(&cmd.analyst_id, cmd.from, cmd.to)
            .await?;
        let statement =
            PayoutStatement::compute(cmd.analyst_id, cmd.from, cmd.to, total_revenue);

        if statement.analyst_payout <= 0 {
            return Err(SubscriptionError::invalid_state(
                "payout",
                "nothing to pay out for this period",
            ));
        }

        let transfer = self
            .gateway
            .transfer(TransferRequest {
                analyst_id: cmd.analyst_id,
                linked_account_id: cmd.linked_account_id,
                amount: statement.analyst_payout,
                reference: format!(
                    "payout:{}:{}..{}",
                    cmd.analyst_id, statement.period_start, statement.period_end
                ),
            })
            .await?;

        // One payout row per transfer id; re-running the command for the
        // same transfer is a no-op
        let outcome = self
            .ledger
            .record(NewPaymentTransaction::payout(
                cmd.analyst_id,
                &transfer.id,
                statement.total_revenue,
                statement.platform_commission,
                statement.analyst_payout,
            ))
            .await?;

        Ok(PayoutReceipt {
            statement,
            gateway_transfer_id: transfer.id,
            newly_recorded: !outcome.is_duplicate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::MockPaymentGateway;
    use crate::adapters::memory::InMemoryPaymentLedger;
    use crate::domain::foundation::{SubscriptionId, TraderId};
    use crate::domain::ledger::TransactionType;

    async fn seed_revenue(ledger: &InMemoryPaymentLedger, analyst_id: AnalystId) {
        for (payment_id, amount) in [("pay_1", 60_000_i64), ("pay_2", 40_000)] {
            ledger
                .record(NewPaymentTransaction::captured_charge(
                    SubscriptionId::new(),
                    TraderId::new(),
                    analyst_id,
                    TransactionType::Renewal,
                    payment_id,
                    amount,
                ))
                .await
                .unwrap();
        }
    }

    fn range() -> (Timestamp, Timestamp) {
        (Timestamp::now().minus_days(30), Timestamp::now().add_days(1))
    }

    #[tokio::test]
    async fn statement_splits_at_twenty_percent() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let analyst_id = AnalystId::new();
        seed_revenue(&ledger, analyst_id).await;

        let (from, to) = range();
        let statement = CalculatePayoutHandler::new(ledger)
            .handle(CalculatePayoutQuery {
                analyst_id,
                from,
                to,
            })
            .await
            .unwrap();

        assert_eq!(statement.total_revenue, 100_000);
        assert_eq!(statement.platform_commission, 20_000);
        assert_eq!(statement.analyst_payout, 80_000);
    }

    #[tokio::test]
    async fn statement_for_quiet_period_is_zero() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let (from, to) = range();

        let statement = CalculatePayoutHandler::new(ledger)
            .handle(CalculatePayoutQuery {
                analyst_id: AnalystId::new(),
                from,
                to,
            })
            .await
            .unwrap();

        assert_eq!(statement.total_revenue, 0);
        assert_eq!(statement.analyst_payout, 0);
    }

    #[tokio::test]
    async fn record_payout_transfers_and_writes_ledger_row() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let analyst_id = AnalystId::new();
        seed_revenue(&ledger, analyst_id).await;

        let (from, to) = range();
        let receipt = RecordPayoutHandler::new(ledger.clone(), gateway.clone())
            .handle(RecordPayoutCommand {
                analyst_id,
                from,
                to,
                linked_account_id: "acc_1".to_string(),
            })
            .await
            .unwrap();

        assert!(receipt.newly_recorded);
        assert_eq!(gateway.transfers().len(), 1);
        assert_eq!(gateway.transfers()[0].amount, 80_000);

        let rows = ledger.snapshot();
        let payout_row = rows
            .iter()
            .find(|r| r.transaction_type == TransactionType::Payout)
            .unwrap();
        assert_eq!(payout_row.payout_amount, Some(80_000));
        assert_eq!(payout_row.commission_amount, Some(20_000));
        assert_eq!(payout_row.gateway_payment_id, receipt.gateway_transfer_id);
    }

    #[tokio::test]
    async fn payout_rows_do_not_inflate_future_revenue() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let analyst_id = AnalystId::new();
        seed_revenue(&ledger, analyst_id).await;

        let (from, to) = range();
        RecordPayoutHandler::new(ledger.clone(), gateway)
            .handle(RecordPayoutCommand {
                analyst_id,
                from,
                to,
                linked_account_id: "acc_1".to_string(),
            })
            .await
            .unwrap();

        // Recomputing the statement still sees only charge revenue
        let statement = CalculatePayoutHandler::new(ledger)
            .handle(CalculatePayoutQuery {
                analyst_id,
                from,
                to,
            })
            .await
            .unwrap();
        assert_eq!(statement.total_revenue, 100_000);
    }

    #[tokio::test]
    async fn empty_period_payout_is_rejected() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let (from, to) = range();

        let err = RecordPayoutHandler::new(ledger, gateway.clone())
            .handle(RecordPayoutCommand {
                analyst_id: AnalystId::new(),
                from,
                to,
                linked_account_id: "acc_1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidState { .. }));
        assert!(gateway.transfers().is_empty());
    }
}
