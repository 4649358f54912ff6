//! Billing command handlers.
//!
//! One handler per operation, each depending only on ports. HTTP routes
//! and the scheduler construct these from shared state.

mod analyst_payout;
mod cancel_subscription;
mod create_subscription;
mod pause_subscription;
mod process_gateway_event;
mod resume_subscription;
mod upgrade_subscription;
mod verify_checkout;

pub use analyst_payout::{
    CalculatePayoutHandler, CalculatePayoutQuery, PayoutReceipt, RecordPayoutCommand,
    RecordPayoutHandler,
};
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use create_subscription::{
    CheckoutDetails, CreateSubscriptionCommand, CreateSubscriptionHandler,
};
pub use pause_subscription::{PauseSubscriptionCommand, PauseSubscriptionHandler};
pub use process_gateway_event::ProcessGatewayEventHandler;
pub use resume_subscription::{ResumeSubscriptionCommand, ResumeSubscriptionHandler};
pub use upgrade_subscription::{UpgradeSubscriptionCommand, UpgradeSubscriptionHandler};
pub use verify_checkout::{VerifyCheckoutCommand, VerifyCheckoutHandler};
