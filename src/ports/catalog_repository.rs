//! CatalogRepository port - tier and discount code lookups.
//!
//! Read-mostly; the single write is the monotonic usage counter bump on a
//! redeemed discount code.

use async_trait::async_trait;

use crate::domain::billing::{DiscountCode, SubscriptionTier};
use crate::domain::foundation::{AnalystId, DiscountCodeId, DomainError, TierId};

/// Port for the pricing catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Find a tier by id.
    async fn find_tier(&self, id: &TierId) -> Result<Option<SubscriptionTier>, DomainError>;

    /// Find an analyst's discount code by its (normalized) code string.
    async fn find_discount_by_code(
        &self,
        analyst_id: &AnalystId,
        code: &str,
    ) -> Result<Option<DiscountCode>, DomainError>;

    /// Increment a code's usage counter after successful redemption.
    async fn increment_discount_usage(&self, id: &DiscountCodeId) -> Result<(), DomainError>;
}
