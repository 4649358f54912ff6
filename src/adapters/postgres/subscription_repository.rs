//! PostgreSQL implementation of SubscriptionRepository.

use crate::domain::foundation::{
    AnalystId, DiscountCodeId, DomainError, ErrorCode, SubscriptionId, TierId, Timestamp, TraderId,
};
use crate::domain::subscription::{BillingCycle, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the SubscriptionRepository port.
///
/// Uses sqlx for type-safe database operations with connection pooling.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubscriptionRow {
    pub id: Uuid,
    pub trader_id: Uuid,
    pub analyst_id: Uuid,
    pub tier_id: Uuid,
    pub status: String,
    pub billing_cycle: String,
    pub price_paid: i64,
    pub discount_applied: i64,
    pub final_price: i64,
    pub start_date: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
    pub payment_retry_count: i32,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub gateway_plan_id: Option<String>,
    pub discount_code_id: Option<Uuid>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            trader_id: TraderId::from_uuid(row.trader_id),
            analyst_id: AnalystId::from_uuid(row.analyst_id),
            tier_id: TierId::from_uuid(row.tier_id),
            status: parse_status(&row.status)?,
            billing_cycle: parse_cycle(&row.billing_cycle)?,
            price_paid: row.price_paid,
            discount_applied: row.discount_applied,
            final_price: row.final_price,
            start_date: Timestamp::from_datetime(row.start_date),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            next_billing_date: row.next_billing_date.map(Timestamp::from_datetime),
            auto_renewal: row.auto_renewal,
            payment_retry_count: row.payment_retry_count.max(0) as u32,
            grace_period_ends_at: row.grace_period_ends_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            suspended_at: row.suspended_at.map(Timestamp::from_datetime),
            gateway_subscription_id: row.gateway_subscription_id,
            gateway_customer_id: row.gateway_customer_id,
            gateway_plan_id: row.gateway_plan_id,
            discount_code_id: row.discount_code_id.map(DiscountCodeId::from_uuid),
            deleted: row.deleted,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

pub(crate) fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    match s {
        "pending_payment" => Ok(SubscriptionStatus::PendingPayment),
        "active" => Ok(SubscriptionStatus::Active),
        "suspended" => Ok(SubscriptionStatus::Suspended),
        "cancelled" => Ok(SubscriptionStatus::Cancelled),
        "expired" => Ok(SubscriptionStatus::Expired),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", s),
        )),
    }
}

pub(crate) fn parse_cycle(s: &str) -> Result<BillingCycle, DomainError> {
    match s {
        "monthly" => Ok(BillingCycle::Monthly),
        "yearly" => Ok(BillingCycle::Yearly),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid billing cycle value: {}", s),
        )),
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, trader_id, analyst_id, tier_id, status, billing_cycle,
           price_paid, discount_applied, final_price, start_date, expires_at,
           next_billing_date, auto_renewal, payment_retry_count,
           grace_period_ends_at, cancelled_at, suspended_at,
           gateway_subscription_id, gateway_customer_id, gateway_plan_id,
           discount_code_id, deleted, created_at, updated_at
    FROM subscriptions
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, trader_id, analyst_id, tier_id, status, billing_cycle,
                price_paid, discount_applied, final_price, start_date, expires_at,
                next_billing_date, auto_renewal, payment_retry_count,
                grace_period_ends_at, cancelled_at, suspended_at,
                gateway_subscription_id, gateway_customer_id, gateway_plan_id,
                discount_code_id, deleted, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                      $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.trader_id.as_uuid())
        .bind(subscription.analyst_id.as_uuid())
        .bind(subscription.tier_id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.price_paid)
        .bind(subscription.discount_applied)
        .bind(subscription.final_price)
        .bind(subscription.start_date.as_datetime())
        .bind(subscription.expires_at.map(|t| *t.as_datetime()))
        .bind(subscription.next_billing_date.map(|t| *t.as_datetime()))
        .bind(subscription.auto_renewal)
        .bind(subscription.payment_retry_count as i32)
        .bind(subscription.grace_period_ends_at.map(|t| *t.as_datetime()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.suspended_at.map(|t| *t.as_datetime()))
        .bind(&subscription.gateway_subscription_id)
        .bind(&subscription.gateway_customer_id)
        .bind(&subscription.gateway_plan_id)
        .bind(subscription.discount_code_id.map(|id| *id.as_uuid()))
        .bind(subscription.deleted)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save subscription", e))?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                tier_id = $3,
                price_paid = $4,
                discount_applied = $5,
                final_price = $6,
                expires_at = $7,
                next_billing_date = $8,
                auto_renewal = $9,
                payment_retry_count = $10,
                grace_period_ends_at = $11,
                cancelled_at = $12,
                suspended_at = $13,
                gateway_subscription_id = $14,
                gateway_customer_id = $15,
                gateway_plan_id = $16,
                deleted = $17,
                updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.tier_id.as_uuid())
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
        .bind(&subscription.gateway_subscription_id)
        .bind(&subscription.gateway_customer_id)
        .bind(&subscription.gateway_plan_id)
        .bind(subscription.deleted)
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE id = $1 AND deleted = false", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "{} WHERE gateway_subscription_id = $1 AND deleted = false",
            SELECT_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(gateway_subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_active_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "{} WHERE trader_id = $1 AND analyst_id = $2 AND status = 'active' AND deleted = false",
            SELECT_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(trader_id.as_uuid())
            .bind(analyst_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find active subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn has_any_for_pair(
        &self,
        trader_id: &TraderId,
        analyst_id: &AnalystId,
    ) -> Result<bool, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE trader_id = $1 AND analyst_id = $2 AND deleted = false
            "#,
        )
        .bind(trader_id.as_uuid())
        .bind(analyst_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count subscriptions", e))?;

        Ok(count > 0)
    }

    async fn count_active_on_tier(&self, tier_id: &TierId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE tier_id = $1 AND status = 'active' AND deleted = false
            "#,
        )
        .bind(tier_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count tier subscriptions", e))?;

        Ok(count.max(0) as u64)
    }

    async fn count_discount_uses(
        &self,
        discount_code_id: &DiscountCodeId,
        trader_id: &TraderId,
    ) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE discount_code_id = $1 AND trader_id = $2 AND deleted = false
            "#,
        )
        .bind(discount_code_id.as_uuid())
        .bind(trader_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count discount uses", e))?;

        Ok(count.max(0) as u32)
    }

    async fn due_for_payment_retry(
        &self,
        attempted_before: Timestamp,
        max_retries: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE status IN ('suspended', 'pending_payment')
              AND payment_retry_count < $1
              AND updated_at <= $2
              AND deleted = false
            ORDER BY updated_at ASC
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(max_retries as i32)
            .bind(attempted_before.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find retry candidates", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn lapsed_active(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE status = 'active'
              AND expires_at IS NOT NULL
              AND expires_at < $1
              AND deleted = false
            ORDER BY expires_at ASC
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(as_of.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find lapsed subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn grace_elapsed(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            r#"{}
            WHERE status = 'suspended'
              AND grace_period_ends_at IS NOT NULL
              AND grace_period_ends_at < $1
              AND deleted = false
            ORDER BY grace_period_ends_at ASC
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(as_of.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find grace-elapsed subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_covers_all_values() {
        assert_eq!(
            parse_status("pending_payment").unwrap(),
            SubscriptionStatus::PendingPayment
        );
        assert_eq!(parse_status("active").unwrap(), SubscriptionStatus::Active);
        assert_eq!(
            parse_status("suspended").unwrap(),
            SubscriptionStatus::Suspended
        );
        assert_eq!(
            parse_status("cancelled").unwrap(),
            SubscriptionStatus::Cancelled
        );
        assert_eq!(parse_status("expired").unwrap(), SubscriptionStatus::Expired);
    }

    #[test]
    fn parse_status_rejects_invalid_values() {
        assert!(parse_status("paused").is_err());
        assert!(parse_status("").is_err());
    }

    #[test]
    fn parse_cycle_roundtrips_with_as_str() {
        for cycle in [BillingCycle::Monthly, BillingCycle::Yearly] {
            assert_eq!(parse_cycle(cycle.as_str()).unwrap(), cycle);
        }
    }

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            SubscriptionStatus::PendingPayment,
            SubscriptionStatus::Active,
            SubscriptionStatus::Suspended,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
    }
}
