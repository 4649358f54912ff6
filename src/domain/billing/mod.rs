//! Pricing domain: tiers, discount codes, and the validation engine.

mod discount;
mod engine;
mod tier;

pub use discount::{DiscountCode, DiscountKind};
pub use engine::{
    admit_to_tier, quote_discount, validate_discount, DiscountContext, DiscountError,
    DiscountQuote,
};
pub use tier::SubscriptionTier;
