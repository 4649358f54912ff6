//! Payment ledger domain: transaction rows and payout computation.
//!
//! The ledger is the source of truth for money movement. It is
//! append-mostly: rows are written once per distinct gateway event and
//! never overwritten, except for refund annotation.

mod payout;
mod transaction;

pub use payout::{PayoutStatement, PLATFORM_COMMISSION_BPS};
pub use transaction::{
    NewPaymentTransaction, PaymentTransaction, RefundNote, TransactionStatus, TransactionType,
};
