//! Discount code entity.
//!
//! Analyst-scoped promotional rule: percentage-or-fixed discount with an
//! optional cap, tier/billing-cycle restrictions, usage and per-user
//! limits, a validity window, and an optional first-time-subscriber
//! restriction.

use crate::domain::foundation::{AnalystId, DiscountCodeId, TierId, Timestamp};
use crate::domain::subscription::BillingCycle;
use serde::{Deserialize, Serialize};

/// How the discount is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percentage of the tier price, floored to the nearest paisa, capped
    /// by an optional maximum.
    Percentage {
        percent: u8,
        max_discount: Option<i64>,
    },
    /// Flat amount in paise, capped at the tier price itself.
    Fixed { amount: i64 },
}

/// An analyst's promotional code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: DiscountCodeId,
    pub analyst_id: AnalystId,
    /// Normalized to uppercase.
    pub code: String,
    pub kind: DiscountKind,
    /// None means all of the analyst's tiers.
    pub applicable_tiers: Option<Vec<TierId>>,
    /// None means both cycles.
    pub cycle_restriction: Option<BillingCycle>,
    /// Total redemptions allowed across all traders.
    pub usage_limit: Option<u32>,
    /// Redemptions allowed per trader.
    pub per_user_limit: Option<u32>,
    pub valid_from: Timestamp,
    pub valid_until: Option<Timestamp>,
    pub first_time_only: bool,
    /// Monotonically incremented on every successful redemption.
    pub usage_count: u32,
    pub active: bool,
}

impl DiscountCode {
    /// Computes the discount for a given tier price, in paise.
    ///
    /// Never exceeds the price: `final_price = price - discount >= 0`.
    pub fn discount_amount(&self, price: i64) -> i64 {
        let raw = match &self.kind {
            DiscountKind::Percentage {
                percent,
                max_discount,
            } => {
                // Integer division floors to the nearest paisa
                let amount = price * i64::from(*percent) / 100;
                match max_discount {
                    Some(cap) => amount.min(*cap),
                    None => amount,
                }
            }
            DiscountKind::Fixed { amount } => *amount,
        };
        raw.clamp(0, price)
    }

    /// Returns true if `now` falls inside the validity window.
    pub fn is_within_window(&self, now: Timestamp) -> bool {
        if now.is_before(&self.valid_from) {
            return false;
        }
        match self.valid_until {
            Some(until) => !now.is_after(&until),
            None => true,
        }
    }

    /// Returns true if the code applies to the given tier.
    pub fn applies_to_tier(&self, tier_id: &TierId) -> bool {
        match &self.applicable_tiers {
            None => true,
            Some(tiers) => tiers.contains(tier_id),
        }
    }

    /// Returns true if the code applies to the given billing cycle.
    pub fn applies_to_cycle(&self, cycle: BillingCycle) -> bool {
        match self.cycle_restriction {
            None => true,
            Some(restricted) => restricted == cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(kind: DiscountKind) -> DiscountCode {
        DiscountCode {
            id: DiscountCodeId::new(),
            analyst_id: AnalystId::new(),
            code: "LAUNCH10".to_string(),
            kind,
            applicable_tiers: None,
            cycle_restriction: None,
            usage_limit: None,
            per_user_limit: None,
            valid_from: Timestamp::now().minus_days(1),
            valid_until: None,
            first_time_only: false,
            usage_count: 0,
            active: true,
        }
    }

    #[test]
    fn ten_percent_of_tier_price() {
        // Tier price 99900 paise, 10% no cap -> discount 9990, final 89910
        let c = code(DiscountKind::Percentage {
            percent: 10,
            max_discount: None,
        });
        assert_eq!(c.discount_amount(99_900), 9_990);
        assert_eq!(99_900 - c.discount_amount(99_900), 89_910);
    }

    #[test]
    fn percentage_floors_to_nearest_paisa() {
        let c = code(DiscountKind::Percentage {
            percent: 33,
            max_discount: None,
        });
        // 101 * 33 / 100 = 33.33 -> 33
        assert_eq!(c.discount_amount(101), 33);
    }

    #[test]
    fn percentage_respects_cap() {
        let c = code(DiscountKind::Percentage {
            percent: 50,
            max_discount: Some(10_000),
        });
        assert_eq!(c.discount_amount(99_900), 10_000);
        // Below the cap the raw percentage wins
        assert_eq!(c.discount_amount(10_000), 5_000);
    }

    #[test]
    fn fixed_discount_caps_at_price() {
        let c = code(DiscountKind::Fixed { amount: 150_000 });
        assert_eq!(c.discount_amount(99_900), 99_900);
        assert_eq!(c.discount_amount(200_000), 150_000);
    }

    #[test]
    fn hundred_percent_zeroes_the_price() {
        let c = code(DiscountKind::Percentage {
            percent: 100,
            max_discount: None,
        });
        assert_eq!(c.discount_amount(99_900), 99_900);
    }

    #[test]
    fn window_check_honors_bounds() {
        let mut c = code(DiscountKind::Fixed { amount: 100 });
        let now = Timestamp::now();

        c.valid_from = now.add_days(1);
        assert!(!c.is_within_window(now));

        c.valid_from = now.minus_days(10);
        c.valid_until = Some(now.minus_days(1));
        assert!(!c.is_within_window(now));

        c.valid_until = Some(now.add_days(1));
        assert!(c.is_within_window(now));
    }

    #[test]
    fn tier_restriction_honored() {
        let tier_a = TierId::new();
        let tier_b = TierId::new();
        let mut c = code(DiscountKind::Fixed { amount: 100 });

        assert!(c.applies_to_tier(&tier_a));

        c.applicable_tiers = Some(vec![tier_a]);
        assert!(c.applies_to_tier(&tier_a));
        assert!(!c.applies_to_tier(&tier_b));
    }

    #[test]
    fn cycle_restriction_honored() {
        let mut c = code(DiscountKind::Fixed { amount: 100 });
        assert!(c.applies_to_cycle(BillingCycle::Monthly));

        c.cycle_restriction = Some(BillingCycle::Yearly);
        assert!(!c.applies_to_cycle(BillingCycle::Monthly));
        assert!(c.applies_to_cycle(BillingCycle::Yearly));
    }
}
