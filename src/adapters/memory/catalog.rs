//! In-memory CatalogRepository for tests and local runs.

use crate::domain::billing::{DiscountCode, SubscriptionTier};
use crate::domain::foundation::{AnalystId, DiscountCodeId, DomainError, ErrorCode, TierId};
use crate::ports::CatalogRepository;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Vec-backed catalog with seeding helpers.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    tiers: Arc<Mutex<Vec<SubscriptionTier>>>,
    discounts: Arc<Mutex<Vec<DiscountCode>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tier.
    pub fn insert_tier(&self, tier: SubscriptionTier) {
        self.tiers.lock().expect("lock poisoned").push(tier);
    }

    /// Seed a discount code.
    pub fn insert_discount(&self, discount: DiscountCode) {
        self.discounts.lock().expect("lock poisoned").push(discount);
    }

    /// Current usage count for a code, for assertions.
    pub fn usage_count(&self, id: &DiscountCodeId) -> Option<u32> {
        self.discounts
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|d| &d.id == id)
            .map(|d| d.usage_count)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_tier(&self, id: &TierId) -> Result<Option<SubscriptionTier>, DomainError> {
        let tiers = self.tiers.lock().expect("lock poisoned");
        Ok(tiers.iter().find(|t| &t.id == id).cloned())
    }

    async fn find_discount_by_code(
        &self,
        analyst_id: &AnalystId,
        code: &str,
    ) -> Result<Option<DiscountCode>, DomainError> {
        let normalized = code.to_uppercase();
        let discounts = self.discounts.lock().expect("lock poisoned");
        Ok(discounts
            .iter()
            .find(|d| &d.analyst_id == analyst_id && d.code == normalized)
            .cloned())
    }

    async fn increment_discount_usage(&self, id: &DiscountCodeId) -> Result<(), DomainError> {
        let mut discounts = self.discounts.lock().expect("lock poisoned");
        match discounts.iter_mut().find(|d| &d.id == id) {
            Some(discount) => {
                discount.usage_count += 1;
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::DiscountNotFound,
                "Discount code not found",
            )),
        }
    }
}
