//! Inbound gateway event model.
//!
//! The gateway posts `{ event, payload: { subscription?, payment? } }`.
//! Only the fields this engine consumes are captured; everything else in
//! the gateway's schema is ignored.

use serde::{Deserialize, Serialize};

use super::WebhookError;

/// A verified, parsed gateway event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Delivery identifier used for inbox deduplication. Taken from the
    /// gateway's delivery-id header; synthesized from the payload when the
    /// header is absent.
    pub id: String,

    /// Event name, e.g. "subscription.charged".
    pub event: String,

    /// Event-specific entities.
    pub payload: GatewayEventPayload,

    /// When the gateway created the event (Unix seconds).
    #[serde(default)]
    pub created_at: i64,
}

/// Entities attached to an event. Either may be absent depending on type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayEventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<GatewaySubscriptionEntity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<GatewayPaymentEntity>,
}

/// Gateway-side view of a recurring subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscriptionEntity {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// End of the current billing period (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_end: Option<i64>,
}

/// Gateway-side view of a single payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentEntity {
    pub id: String,

    /// Amount in paise.
    #[serde(default)]
    pub amount: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Gateway event names this engine routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventKind {
    /// First charge captured; subscription is live at the gateway.
    SubscriptionActivated,
    /// Recurring charge captured.
    SubscriptionCharged,
    /// Charge attempt failed; the gateway will keep the subscription
    /// pending while it retries.
    SubscriptionPending,
    /// The gateway exhausted its own retries.
    SubscriptionHalted,
    /// Subscription cancelled at the gateway.
    SubscriptionCancelled,
    /// Final cycle completed; no further charges.
    SubscriptionCompleted,
    SubscriptionPaused,
    SubscriptionResumed,
    /// Standalone payment failure outside the subscription machinery.
    PaymentFailed,
    /// A captured payment was refunded.
    RefundProcessed,
    /// Anything this engine does not handle.
    Unknown,
}

impl GatewayEventKind {
    /// Parse the gateway's event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "subscription.activated" => Self::SubscriptionActivated,
            "subscription.charged" => Self::SubscriptionCharged,
            "subscription.pending" => Self::SubscriptionPending,
            "subscription.halted" => Self::SubscriptionHalted,
            "subscription.cancelled" => Self::SubscriptionCancelled,
            "subscription.completed" => Self::SubscriptionCompleted,
            "subscription.paused" => Self::SubscriptionPaused,
            "subscription.resumed" => Self::SubscriptionResumed,
            "payment.failed" => Self::PaymentFailed,
            "refund.processed" => Self::RefundProcessed,
            _ => Self::Unknown,
        }
    }

    /// Returns true for events that carry a captured charge.
    ///
    /// Charge events get the ledger pre-check: an already-recorded gateway
    /// payment id makes the whole delivery a no-op.
    pub fn is_charge(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionActivated | Self::SubscriptionCharged
        )
    }
}

impl GatewayEvent {
    /// Parses a raw, already signature-verified body.
    ///
    /// `delivery_id` comes from the gateway's delivery-id header; when
    /// absent the id is synthesized from the event name and the payment
    /// (or subscription) id so deduplication still works.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::ParseError` on malformed JSON.
    pub fn parse(body: &[u8], delivery_id: Option<&str>) -> Result<Self, WebhookError> {
        #[derive(Deserialize)]
        struct Wire {
            event: String,
            #[serde(default)]
            payload: GatewayEventPayload,
            #[serde(default)]
            created_at: i64,
        }

        let wire: Wire =
            serde_json::from_slice(body).map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let id = match delivery_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let entity_id = wire
                    .payload
                    .payment
                    .as_ref()
                    .map(|p| p.id.as_str())
                    .or_else(|| wire.payload.subscription.as_ref().map(|s| s.id.as_str()))
                    .unwrap_or("none");
                format!("{}:{}", wire.event, entity_id)
            }
        };

        Ok(Self {
            id,
            event: wire.event,
            payload: wire.payload,
            created_at: wire.created_at,
        })
    }

    /// Parse the event name into a known kind.
    pub fn kind(&self) -> GatewayEventKind {
        GatewayEventKind::from_name(&self.event)
    }

    /// The payment entity, required for charge/failure events.
    pub fn payment(&self) -> Result<&GatewayPaymentEntity, WebhookError> {
        self.payload
            .payment
            .as_ref()
            .ok_or(WebhookError::MissingField("payment"))
    }

    /// The subscription entity, required for all subscription events.
    pub fn subscription(&self) -> Result<&GatewaySubscriptionEntity, WebhookError> {
        self.payload
            .subscription
            .as_ref()
            .ok_or(WebhookError::MissingField("subscription"))
    }
}

/// Builder for creating test GatewayEvent instances.
#[cfg(test)]
pub struct GatewayEventBuilder {
    id: String,
    event: String,
    subscription: Option<GatewaySubscriptionEntity>,
    payment: Option<GatewayPaymentEntity>,
    created_at: i64,
}

#[cfg(test)]
impl GatewayEventBuilder {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event: event.into(),
            subscription: None,
            payment: None,
            created_at: 1_705_276_800,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn subscription(mut self, id: impl Into<String>) -> Self {
        self.subscription = Some(GatewaySubscriptionEntity {
            id: id.into(),
            plan_id: None,
            status: None,
            current_end: None,
        });
        self
    }

    pub fn payment(mut self, id: impl Into<String>, amount: i64) -> Self {
        self.payment = Some(GatewayPaymentEntity {
            id: id.into(),
            amount,
            status: Some("captured".to_string()),
            error_code: None,
            error_description: None,
            method: None,
        });
        self
    }

    pub fn failed_payment(
        mut self,
        id: impl Into<String>,
        amount: i64,
        code: impl Into<String>,
    ) -> Self {
        self.payment = Some(GatewayPaymentEntity {
            id: id.into(),
            amount,
            status: Some("failed".to_string()),
            error_code: Some(code.into()),
            error_description: Some("payment declined".to_string()),
            method: None,
        });
        self
    }

    pub fn build(self) -> GatewayEvent {
        GatewayEvent {
            id: self.id,
            event: self.event,
            payload: GatewayEventPayload {
                subscription: self.subscription,
                payment: self.payment,
            },
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_charged_event() {
        let body = br#"{
            "event": "subscription.charged",
            "payload": {
                "subscription": {"id": "gsub_1"},
                "payment": {"id": "pay_1", "amount": 99900}
            },
            "created_at": 1705276800
        }"#;

        let event = GatewayEvent::parse(body, Some("evt_abc")).unwrap();

        assert_eq!(event.id, "evt_abc");
        assert_eq!(event.kind(), GatewayEventKind::SubscriptionCharged);
        assert_eq!(event.payment().unwrap().id, "pay_1");
        assert_eq!(event.payment().unwrap().amount, 99_900);
        assert_eq!(event.subscription().unwrap().id, "gsub_1");
    }

    #[test]
    fn parse_without_delivery_header_synthesizes_id() {
        let body = br#"{
            "event": "subscription.charged",
            "payload": {"payment": {"id": "pay_9", "amount": 100}}
        }"#;

        let event = GatewayEvent::parse(body, None).unwrap();
        assert_eq!(event.id, "subscription.charged:pay_9");
    }

    #[test]
    fn synthesized_id_falls_back_to_subscription() {
        let body = br#"{
            "event": "subscription.cancelled",
            "payload": {"subscription": {"id": "gsub_7"}}
        }"#;

        let event = GatewayEvent::parse(body, None).unwrap();
        assert_eq!(event.id, "subscription.cancelled:gsub_7");
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let result = GatewayEvent::parse(b"not json", Some("evt_1"));
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn unknown_event_names_map_to_unknown() {
        assert_eq!(
            GatewayEventKind::from_name("settlement.processed"),
            GatewayEventKind::Unknown
        );
    }

    #[test]
    fn charge_kinds_are_flagged() {
        assert!(GatewayEventKind::SubscriptionActivated.is_charge());
        assert!(GatewayEventKind::SubscriptionCharged.is_charge());
        assert!(!GatewayEventKind::SubscriptionPending.is_charge());
        assert!(!GatewayEventKind::SubscriptionCancelled.is_charge());
    }

    #[test]
    fn missing_payment_entity_errors() {
        let event = GatewayEventBuilder::new("subscription.charged")
            .subscription("gsub_1")
            .build();
        assert!(matches!(
            event.payment(),
            Err(WebhookError::MissingField("payment"))
        ));
    }

    #[test]
    fn failure_payload_carries_error_context() {
        let event = GatewayEventBuilder::new("subscription.pending")
            .subscription("gsub_1")
            .failed_payment("pay_f", 99_900, "BAD_FUNDS")
            .build();

        let payment = event.payment().unwrap();
        assert_eq!(payment.error_code.as_deref(), Some("BAD_FUNDS"));
        assert_eq!(payment.status.as_deref(), Some("failed"));
    }
}
