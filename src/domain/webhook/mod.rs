//! Webhook domain: signature verification, event parsing, and the
//! durable intake pipeline.
//!
//! Signature verification always happens before event semantics are
//! parsed; a verification failure is an authentication error, never a
//! processing error.

mod errors;
mod event;
mod pipeline;
mod signature;

pub use errors::WebhookError;
pub use event::{
    GatewayEvent, GatewayEventKind, GatewayEventPayload, GatewayPaymentEntity,
    GatewaySubscriptionEntity,
};
pub use pipeline::{
    AcceptOutcome, GatewayEventHandler, InboundEventPipeline, ProcessResult, DEFAULT_MAX_ATTEMPTS,
};
pub use signature::{CheckoutSignatureVerifier, WebhookSignatureVerifier};

#[cfg(test)]
pub use event::GatewayEventBuilder;
#[cfg(test)]
pub use signature::compute_test_signature;
