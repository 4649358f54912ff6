//! Analyst payout computation.
//!
//! Pure read-and-compute over the payment ledger: captured subscription
//! revenue for a date range, split between the platform and the analyst.
//! The actual funds transfer is recorded separately as an idempotent
//! `payout` ledger row keyed by the transfer provider's identifier.

use crate::domain::foundation::{AnalystId, Timestamp};
use serde::{Deserialize, Serialize};

/// Platform commission in basis points (20%).
pub const PLATFORM_COMMISSION_BPS: i64 = 2_000;

/// Revenue split for one analyst over one date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutStatement {
    pub analyst_id: AnalystId,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    /// Sum of captured subscription_payment/renewal amounts, in paise.
    pub total_revenue: i64,
    pub platform_commission: i64,
    pub analyst_payout: i64,
}

impl PayoutStatement {
    /// Splits captured revenue at the fixed platform commission rate.
    ///
    /// The commission floors to the nearest paisa; the analyst receives
    /// the remainder, so the split always sums back to the total.
    pub fn compute(
        analyst_id: AnalystId,
        period_start: Timestamp,
        period_end: Timestamp,
        total_revenue: i64,
    ) -> Self {
        let platform_commission = total_revenue * PLATFORM_COMMISSION_BPS / 10_000;
        Self {
            analyst_id,
            period_start,
            period_end,
            total_revenue,
            platform_commission,
            analyst_payout: total_revenue - platform_commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(total: i64) -> PayoutStatement {
        PayoutStatement::compute(
            AnalystId::new(),
            Timestamp::now().minus_days(30),
            Timestamp::now(),
            total,
        )
    }

    #[test]
    fn twenty_percent_commission() {
        let s = statement(100_000);
        assert_eq!(s.platform_commission, 20_000);
        assert_eq!(s.analyst_payout, 80_000);
    }

    #[test]
    fn split_always_reconciles_to_total() {
        for total in [0, 1, 99, 99_900, 1_234_567] {
            let s = statement(total);
            assert_eq!(s.platform_commission + s.analyst_payout, total);
        }
    }

    #[test]
    fn commission_floors_on_odd_amounts() {
        // 99 * 20% = 19.8 -> 19; analyst gets the rounding paisa
        let s = statement(99);
        assert_eq!(s.platform_commission, 19);
        assert_eq!(s.analyst_payout, 80);
    }

    #[test]
    fn zero_revenue_zero_split() {
        let s = statement(0);
        assert_eq!(s.platform_commission, 0);
        assert_eq!(s.analyst_payout, 0);
    }
}
