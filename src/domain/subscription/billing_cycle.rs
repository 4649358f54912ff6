//! Billing cycle value object.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};

/// Recurring billing cadence for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Advances a billing anchor by exactly one cycle.
    ///
    /// The anchor is the *current* `expires_at`, never "now": early or late
    /// gateway delivery must not shift the billing date. Monthly adds one
    /// calendar month, yearly one calendar year.
    pub fn advance(&self, anchor: Timestamp) -> Timestamp {
        match self {
            BillingCycle::Monthly => anchor.add_calendar_months(1),
            BillingCycle::Yearly => anchor.add_calendar_years(1),
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
