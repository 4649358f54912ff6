//! PostgreSQL implementation of PaymentLedger.
//!
//! The unique index on `gateway_payment_id` is the idempotency guard;
//! `record` inserts with `ON CONFLICT DO NOTHING` and re-reads inside the
//! same transaction so a racing duplicate surfaces as a no-op.

use crate::domain::foundation::{
    AnalystId, DomainError, ErrorCode, SubscriptionId, Timestamp, TraderId, TransactionId,
};
use crate::domain::ledger::{
    NewPaymentTransaction, PaymentTransaction, RefundNote, TransactionStatus, TransactionType,
};
use crate::ports::{LedgerStats, PaymentLedger, RecordOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the PaymentLedger port.
pub struct PostgresPaymentLedger {
    pool: PgPool,
}

impl PostgresPaymentLedger {
    /// Creates a ledger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment transaction.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransactionRow {
    pub id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub trader_id: Option<Uuid>,
    pub analyst_id: Uuid,
    pub gateway_payment_id: String,
    pub transaction_type: String,
    pub amount: i64,
    pub status: String,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub payout_amount: Option<i64>,
    pub commission_amount: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(PaymentTransaction {
            id: TransactionId::from_uuid(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            trader_id: row.trader_id.map(TraderId::from_uuid),
            analyst_id: AnalystId::from_uuid(row.analyst_id),
            gateway_payment_id: row.gateway_payment_id,
            transaction_type: parse_type(&row.transaction_type)?,
            amount: row.amount,
            status: parse_txn_status(&row.status)?,
            failure_code: row.failure_code,
            failure_reason: row.failure_reason,
            retry_count: row.retry_count.max(0) as u32,
            refund_amount: row.refund_amount,
            refund_reason: row.refund_reason,
            payout_amount: row.payout_amount,
            commission_amount: row.commission_amount,
            metadata: row.metadata,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

pub(crate) fn parse_type(s: &str) -> Result<TransactionType, DomainError> {
    match s {
        "subscription_payment" => Ok(TransactionType::SubscriptionPayment),
        "renewal" => Ok(TransactionType::Renewal),
        "refund" => Ok(TransactionType::Refund),
        "payout" => Ok(TransactionType::Payout),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid transaction type: {}", s),
        )),
    }
}

pub(crate) fn parse_txn_status(s: &str) -> Result<TransactionStatus, DomainError> {
    match s {
        "pending" => Ok(TransactionStatus::Pending),
        "authorized" => Ok(TransactionStatus::Authorized),
        "captured" => Ok(TransactionStatus::Captured),
        "failed" => Ok(TransactionStatus::Failed),
        "refunded" => Ok(TransactionStatus::Refunded),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid transaction status: {}", s),
        )),
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, subscription_id, trader_id, analyst_id, gateway_payment_id,
           transaction_type, amount, status, failure_code, failure_reason,
           retry_count, refund_amount, refund_reason, payout_amount,
           commission_amount, metadata, created_at
    FROM payment_transactions
"#;

pub(crate) const INSERT_SQL: &str = r#"
    INSERT INTO payment_transactions (
        id, subscription_id, trader_id, analyst_id, gateway_payment_id,
        transaction_type, amount, status, failure_code, failure_reason,
        retry_count, payout_amount, commission_amount, metadata, created_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
    ON CONFLICT (gateway_payment_id) DO NOTHING
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

/// Binds a NewPaymentTransaction onto the shared insert statement.
pub(crate) fn bind_insert<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    id: Uuid,
    txn: &'q NewPaymentTransaction,
    created_at: DateTime<Utc>,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(id)
        .bind(txn.subscription_id.map(|s| *s.as_uuid()))
        .bind(txn.trader_id.map(|t| *t.as_uuid()))
        .bind(txn.analyst_id.as_uuid())
        .bind(&txn.gateway_payment_id)
        .bind(txn.transaction_type.as_str())
        .bind(txn.amount)
        .bind(txn.status.as_str())
        .bind(&txn.failure_code)
        .bind(&txn.failure_reason)
        .bind(txn.retry_count as i32)
        .bind(txn.payout_amount)
        .bind(txn.commission_amount)
        .bind(&txn.metadata)
        .bind(created_at)
}

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn record(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<RecordOutcome, DomainError> {
        // Insert and re-read inside one transaction: a concurrent writer
        // of the same payment id cannot slip between the two.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let inserted = bind_insert(sqlx::query(INSERT_SQL), id, &transaction, created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to record transaction", e))?;

        let sql = format!("{} WHERE gateway_payment_id = $1", SELECT_COLUMNS);
        let row: TransactionRow = sqlx::query_as(&sql)
            .bind(&transaction.gateway_payment_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to read back transaction", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        let stored = PaymentTransaction::try_from(row)?;
        if inserted.rows_affected() == 0 {
            Ok(RecordOutcome::Duplicate(stored))
        } else {
            Ok(RecordOutcome::Recorded(stored))
        }
    }

    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        let sql = format!("{} WHERE gateway_payment_id = $1", SELECT_COLUMNS);
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(gateway_payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find transaction", e))?;

        row.map(PaymentTransaction::try_from).transpose()
    }

    async fn annotate_refund(
        &self,
        gateway_payment_id: &str,
        note: RefundNote,
    ) -> Result<PaymentTransaction, DomainError> {
        let sql = format!(
            r#"
            UPDATE payment_transactions SET
                status = 'refunded',
                refund_amount = $2,
                refund_reason = $3
            WHERE gateway_payment_id = $1 AND status = 'captured'
            RETURNING {}
            "#,
            // RETURNING needs bare column names
            "id, subscription_id, trader_id, analyst_id, gateway_payment_id, \
             transaction_type, amount, status, failure_code, failure_reason, \
             retry_count, refund_amount, refund_reason, payout_amount, \
             commission_amount, metadata, created_at"
        );
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(gateway_payment_id)
            .bind(note.amount)
            .bind(&note.reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to annotate refund", e))?;

        match row {
            Some(row) => PaymentTransaction::try_from(row),
            None => Err(DomainError::new(
                ErrorCode::TransactionNotFound,
                "No captured transaction for this payment id",
            )),
        }
    }

    async fn captured_revenue(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount) FROM payment_transactions
            WHERE analyst_id = $1
              AND status = 'captured'
              AND transaction_type IN ('subscription_payment', 'renewal')
              AND created_at >= $2
              AND created_at <= $3
            "#,
        )
        .bind(analyst_id.as_uuid())
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum revenue", e))?;

        Ok(total.unwrap_or(0))
    }

    async fn list_for_trader(
        &self,
        trader_id: &TraderId,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let sql = format!(
            "{} WHERE trader_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(trader_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list transactions", e))?;

        rows.into_iter().map(PaymentTransaction::try_from).collect()
    }

    async fn list_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE analyst_id = $1 AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at DESC
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(analyst_id.as_uuid())
            .bind(from.as_datetime())
            .bind(to.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list transactions", e))?;

        rows.into_iter().map(PaymentTransaction::try_from).collect()
    }

    async fn stats_for_analyst(
        &self,
        analyst_id: &AnalystId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<LedgerStats, DomainError> {
        let row: (i64, i64, i64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'captured'),
                   COUNT(*) FILTER (WHERE status = 'failed'),
                   SUM(amount) FILTER (WHERE status = 'captured')
            FROM payment_transactions
            WHERE analyst_id = $1 AND created_at >= $2 AND created_at <= $3
            "#,
        )
        .bind(analyst_id.as_uuid())
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to compute stats", e))?;

        let (transaction_count, captured_count, failed_count, total_captured) = row;
        let total_captured = total_captured.unwrap_or(0);
        let attempts = captured_count + failed_count;

        Ok(LedgerStats {
            transaction_count: transaction_count.max(0) as u64,
            captured_count: captured_count.max(0) as u64,
            failed_count: failed_count.max(0) as u64,
            total_captured,
            success_rate: if attempts == 0 {
                0.0
            } else {
                captured_count as f64 / attempts as f64
            },
            average_amount: if captured_count == 0 {
                0
            } else {
                total_captured / captured_count
            },
        })
    }
}
