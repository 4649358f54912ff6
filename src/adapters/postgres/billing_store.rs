//! PostgreSQL implementation of BillingStore.
//!
//! One database transaction per webhook-driven transition:
//!
//! 1. `SELECT ... FOR UPDATE` on the subscription row - concurrent
//!    deliveries for the same subscription serialize here
//! 2. `INSERT ... ON CONFLICT (gateway_payment_id) DO NOTHING` - a
//!    duplicate payment id means the whole apply is a no-op
//! 3. full subscription row update
//!
//! Either everything commits or the transaction rolls back; a ledger row
//! without its transition (or vice versa) cannot exist.

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::ledger::NewPaymentTransaction;
use crate::domain::subscription::Subscription;
use crate::ports::{ApplyOutcome, BillingStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::payment_ledger::{bind_insert, INSERT_SQL};

/// PostgreSQL implementation of the BillingStore port.
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    /// Creates a store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn apply(
        &self,
        subscription: &Subscription,
        transaction: &NewPaymentTransaction,
    ) -> Result<ApplyOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // Row lock: the subscription row is the unit of mutual exclusion
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM subscriptions WHERE id = $1 FOR UPDATE")
                .bind(subscription.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to lock subscription row", e))?;
        if locked.is_none() {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }

        // The unique constraint is the idempotency guard; zero rows
        // affected means a concurrent (or earlier) delivery won
        let inserted = bind_insert(
            sqlx::query(INSERT_SQL),
            Uuid::new_v4(),
            transaction,
            Utc::now(),
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert ledger row", e))?;

        if inserted.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| db_error("Failed to roll back duplicate apply", e))?;
            return Ok(ApplyOutcome::DuplicatePayment);
        }

        sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                price_paid = $3,
                discount_applied = $4,
                final_price = $5,
                expires_at = $6,
                next_billing_date = $7,
                auto_renewal = $8,
                payment_retry_count = $9,
                grace_period_ends_at = $10,
                cancelled_at = $11,
                suspended_at = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.price_paid)
        .bind(subscription.discount_applied)
        .bind(subscription.final_price)
        .bind(subscription.expires_at.map(|t| *t.as_datetime()))
        .bind(subscription.next_billing_date.map(|t| *t.as_datetime()))
        .bind(subscription.auto_renewal)
        .bind(subscription.payment_retry_count as i32)
        .bind(subscription.grace_period_ends_at.map(|t| *t.as_datetime()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.suspended_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to update subscription", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit apply", e))?;

        Ok(ApplyOutcome::Applied)
    }
}
