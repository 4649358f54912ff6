//! Analyst-defined pricing tiers.

use crate::domain::foundation::{AnalystId, TierId, Timestamp};
use crate::domain::subscription::BillingCycle;
use serde::{Deserialize, Serialize};

/// A subscription plan offered by an analyst.
///
/// Prices are per billing cycle, in paise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    pub id: TierId,
    pub analyst_id: AnalystId,
    pub name: String,
    pub monthly_price: i64,
    pub yearly_price: i64,
    /// Feature flags shown to traders (e.g. "intraday-calls", "chat").
    pub features: Vec<String>,
    /// None means unlimited capacity.
    pub max_subscribers: Option<u32>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl SubscriptionTier {
    /// Returns the list price for the given billing cycle.
    pub fn price_for(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Yearly => self.yearly_price,
        }
    }

    /// Capacity admission check, applied at subscription creation only.
    ///
    /// A new subscriber is admitted while the count of currently-active
    /// subscriptions is strictly below the cap. Renewals are never
    /// re-checked.
    pub fn has_capacity(&self, active_subscribers: u64) -> bool {
        match self.max_subscribers {
            None => true,
            Some(cap) => active_subscribers < u64::from(cap),
        }
    }
}
