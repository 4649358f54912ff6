//! Foundation - shared domain building blocks.
//!
//! Strongly-typed identifiers, timestamps, error types, the state machine
//! trait, and domain event infrastructure used across the billing core.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent};
pub use ids::{AnalystId, DiscountCodeId, SubscriptionId, TierId, TraderId, TransactionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
