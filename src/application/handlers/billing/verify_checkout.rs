//! VerifyCheckoutHandler - browser-redirect payment confirmation.
//!
//! After the client-side payment flow completes, the gateway redirects
//! the browser back with `{order_id, payment_id, signature}`. The
//! signature must verify before the frontend may treat checkout as
//! complete; the authoritative activation still arrives via webhook.

use crate::domain::subscription::SubscriptionError;
use crate::domain::webhook::CheckoutSignatureVerifier;

/// Command carrying the redirect confirmation triple.
#[derive(Debug, Clone)]
pub struct VerifyCheckoutCommand {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Handler for checkout confirmation verification.
pub struct VerifyCheckoutHandler {
    verifier: CheckoutSignatureVerifier,
}

impl VerifyCheckoutHandler {
    pub fn new(verifier: CheckoutSignatureVerifier) -> Self {
        Self { verifier }
    }

    /// Verifies the confirmation. Rejection happens before anything else
    /// looks at the payload.
    pub fn handle(&self, cmd: &VerifyCheckoutCommand) -> Result<(), SubscriptionError> {
        if self
            .verifier
            .verify(&cmd.order_id, &cmd.payment_id, &cmd.signature)
        {
            Ok(())
        } else {
            Err(SubscriptionError::InvalidCheckoutSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::compute_test_signature;

    const KEY_SECRET: &str = "key_secret_test";

    fn handler() -> VerifyCheckoutHandler {
        VerifyCheckoutHandler::new(CheckoutSignatureVerifier::new(KEY_SECRET))
    }

    #[test]
    fn valid_confirmation_passes() {
        let cmd = VerifyCheckoutCommand {
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: compute_test_signature(KEY_SECRET, b"order_1|pay_1"),
        };

        assert!(handler().handle(&cmd).is_ok());
    }

    #[test]
    fn forged_signature_rejected() {
        let cmd = VerifyCheckoutCommand {
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "deadbeef".repeat(8),
        };

        let err = handler().handle(&cmd).unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidCheckoutSignature));
    }

    #[test]
    fn signature_for_other_payment_rejected() {
        let cmd = VerifyCheckoutCommand {
            order_id: "order_1".to_string(),
            payment_id: "pay_2".to_string(),
            signature: compute_test_signature(KEY_SECRET, b"order_1|pay_1"),
        };

        assert!(handler().handle(&cmd).is_err());
    }
}
