//! Background scheduler adapters.

mod billing_sweeper;

pub use billing_sweeper::{BillingSweeper, SweepReport};
