//! PostgreSQL implementation of CatalogRepository.

use crate::domain::billing::{DiscountCode, DiscountKind, SubscriptionTier};
use crate::domain::foundation::{
    AnalystId, DiscountCodeId, DomainError, ErrorCode, TierId, Timestamp,
};
use crate::domain::subscription::BillingCycle;
use crate::ports::CatalogRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the CatalogRepository port.
pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    /// Creates a catalog with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: Uuid,
    analyst_id: Uuid,
    name: String,
    monthly_price: i64,
    yearly_price: i64,
    features: Vec<String>,
    max_subscribers: Option<i32>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<TierRow> for SubscriptionTier {
    fn from(row: TierRow) -> Self {
        SubscriptionTier {
            id: TierId::from_uuid(row.id),
            analyst_id: AnalystId::from_uuid(row.analyst_id),
            name: row.name,
            monthly_price: row.monthly_price,
            yearly_price: row.yearly_price,
            features: row.features,
            max_subscribers: row.max_subscribers.map(|m| m.max(0) as u32),
            active: row.active,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: Uuid,
    analyst_id: Uuid,
    code: String,
    kind: String,
    percent: Option<i32>,
    max_discount: Option<i64>,
    fixed_amount: Option<i64>,
    applicable_tiers: Option<Vec<Uuid>>,
    cycle_restriction: Option<String>,
    usage_limit: Option<i32>,
    per_user_limit: Option<i32>,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    first_time_only: bool,
    usage_count: i32,
    active: bool,
}

impl TryFrom<DiscountRow> for DiscountCode {
    type Error = DomainError;

    fn try_from(row: DiscountRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "percentage" => DiscountKind::Percentage {
                percent: row.percent.unwrap_or(0).clamp(0, 100) as u8,
                max_discount: row.max_discount,
            },
            "fixed" => DiscountKind::Fixed {
                amount: row.fixed_amount.unwrap_or(0),
            },
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid discount kind: {}", other),
                ))
            }
        };

        let cycle_restriction = match row.cycle_restriction.as_deref() {
            None => None,
            Some("monthly") => Some(BillingCycle::Monthly),
            Some("yearly") => Some(BillingCycle::Yearly),
            Some(other) => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid cycle restriction: {}", other),
                ))
            }
        };

        Ok(DiscountCode {
            id: DiscountCodeId::from_uuid(row.id),
            analyst_id: AnalystId::from_uuid(row.analyst_id),
            code: row.code,
            kind,
            applicable_tiers: row
                .applicable_tiers
                .map(|tiers| tiers.into_iter().map(TierId::from_uuid).collect()),
            cycle_restriction,
            usage_limit: row.usage_limit.map(|l| l.max(0) as u32),
            per_user_limit: row.per_user_limit.map(|l| l.max(0) as u32),
            valid_from: Timestamp::from_datetime(row.valid_from),
            valid_until: row.valid_until.map(Timestamp::from_datetime),
            first_time_only: row.first_time_only,
            usage_count: row.usage_count.max(0) as u32,
            active: row.active,
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    async fn find_tier(&self, id: &TierId) -> Result<Option<SubscriptionTier>, DomainError> {
        let row: Option<TierRow> = sqlx::query_as(
            r#"
            SELECT id, analyst_id, name, monthly_price, yearly_price, features,
                   max_subscribers, active, created_at
            FROM subscription_tiers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find tier", e))?;

        Ok(row.map(SubscriptionTier::from))
    }

    async fn find_discount_by_code(
        &self,
        analyst_id: &AnalystId,
        code: &str,
    ) -> Result<Option<DiscountCode>, DomainError> {
        let row: Option<DiscountRow> = sqlx::query_as(
            r#"
            SELECT id, analyst_id, code, kind, percent, max_discount, fixed_amount,
                   applicable_tiers, cycle_restriction, usage_limit, per_user_limit,
                   valid_from, valid_until, first_time_only, usage_count, active
            FROM discount_codes
            WHERE analyst_id = $1 AND code = UPPER($2)
            "#,
        )
        .bind(analyst_id.as_uuid())
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find discount code", e))?;

        row.map(DiscountCode::try_from).transpose()
    }

    async fn increment_discount_usage(&self, id: &DiscountCodeId) -> Result<(), DomainError> {
        let result =
            sqlx::query("UPDATE discount_codes SET usage_count = usage_count + 1 WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to increment usage", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::DiscountNotFound,
                "Discount code not found",
            ));
        }
        Ok(())
    }
}
