//! ProcessGatewayEventHandler - routes verified gateway events to
//! subscription transitions.
//!
//! This is the single entry point behind the webhook inbox. For every
//! event it applies at most one state-machine transition and one ledger
//! insert, committed atomically through `BillingStore::apply`. Charge
//! events are pre-checked against the ledger: an already-recorded gateway
//! payment id makes the whole delivery an idempotent no-op.
//!
//! The platform never fabricates subscriptions from webhooks; an event
//! referencing an unknown subscription is a fatal processing error that
//! goes to manual reconciliation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{EventId, SerializableDomainEvent, Timestamp};
use crate::domain::ledger::{NewPaymentTransaction, TransactionType};
use crate::domain::subscription::{
    ChargeFailure, ExpiryReason, FailureOutcome, FirstCharge, RenewalCharge, Subscription,
    SubscriptionEvent, SubscriptionStatus, SuspensionReason,
};
use crate::domain::webhook::{GatewayEvent, GatewayEventHandler, GatewayEventKind, WebhookError};
use crate::ports::{
    ApplyOutcome, BillingStore, EventPublisher, PaymentLedger, SubscriptionRepository,
};

/// Handler for inbound gateway events.
pub struct ProcessGatewayEventHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn PaymentLedger>,
    store: Arc<dyn BillingStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl ProcessGatewayEventHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn PaymentLedger>,
        store: Arc<dyn BillingStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            store,
            publisher,
        }
    }

    async fn find_subscription(
        &self,
        event: &GatewayEvent,
    ) -> Result<Subscription, WebhookError> {
        let entity = event.subscription()?;
        self.subscriptions
            .find_by_gateway_subscription_id(&entity.id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)
    }

    async fn publish(&self, event: SubscriptionEvent) {
        if let Err(e) = self.publisher.publish(event.to_envelope()).await {
            tracing::warn!(error = %e, "domain event publish failed; ledger remains authoritative");
        }
    }

    /// subscription.activated / subscription.charged
    async fn handle_charge(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let payment = event.payment()?.clone();

        // Idempotency pre-check. The ledger's unique constraint is the
        // real guard; this just short-circuits redeliveries cheaply.
        if self
            .ledger
            .find_by_gateway_payment_id(&payment.id)
            .await?
            .is_some()
        {
            return Err(WebhookError::Ignored(format!(
                "gateway payment {} already recorded",
                payment.id
            )));
        }

        let mut subscription = self.find_subscription(event).await?;
        let now = Timestamp::now();

        let (transaction_type, domain_event) = match subscription.status {
            SubscriptionStatus::PendingPayment => {
                subscription.activate(&FirstCharge {
                    gateway_payment_id: payment.id.clone(),
                    amount: payment.amount,
                    occurred_at: now,
                })?;
                let expires_at = subscription.expires_at.unwrap_or(now);
                (
                    TransactionType::SubscriptionPayment,
                    SubscriptionEvent::Activated {
                        event_id: EventId::new(),
                        subscription_id: subscription.id,
                        trader_id: subscription.trader_id,
                        analyst_id: subscription.analyst_id,
                        tier_id: subscription.tier_id,
                        expires_at,
                        occurred_at: now,
                    },
                )
            }
            SubscriptionStatus::Active => {
                subscription.renew(&RenewalCharge {
                    gateway_payment_id: payment.id.clone(),
                    amount: payment.amount,
                    occurred_at: now,
                })?;
                let expires_at = subscription.expires_at.unwrap_or(now);
                (
                    TransactionType::Renewal,
                    SubscriptionEvent::Renewed {
                        event_id: EventId::new(),
                        subscription_id: subscription.id,
                        new_expires_at: expires_at,
                        occurred_at: now,
                    },
                )
            }
            SubscriptionStatus::Suspended => {
                subscription.recover(&RenewalCharge {
                    gateway_payment_id: payment.id.clone(),
                    amount: payment.amount,
                    occurred_at: now,
                })?;
                let expires_at = subscription.expires_at.unwrap_or(now);
                (
                    TransactionType::Renewal,
                    SubscriptionEvent::Renewed {
                        event_id: EventId::new(),
                        subscription_id: subscription.id,
                        new_expires_at: expires_at,
                        occurred_at: now,
                    },
                )
            }
            status => {
                return Err(WebhookError::InvalidTransition(format!(
                    "charge received for {} subscription",
                    status
                )))
            }
        };

        let transaction = NewPaymentTransaction::captured_charge(
            subscription.id,
            subscription.trader_id,
            subscription.analyst_id,
            transaction_type,
            &payment.id,
            payment.amount,
        );

        match self.store.apply(&subscription, &transaction).await? {
            ApplyOutcome::Applied => {
                self.publish(domain_event).await;
                Ok(())
            }
            // Lost the race against a concurrent delivery; the winner
            // already produced the side effects
            ApplyOutcome::DuplicatePayment => Ok(()),
        }
    }

    /// subscription.pending / subscription.halted / payment.failed
    async fn handle_failure(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let payment = event.payment()?.clone();

        if self
            .ledger
            .find_by_gateway_payment_id(&payment.id)
            .await?
            .is_some()
        {
            return Err(WebhookError::Ignored(format!(
                "gateway payment {} already recorded",
                payment.id
            )));
        }

        let mut subscription = self.find_subscription(event).await?;
        let now = Timestamp::now();

        let outcome = subscription.record_payment_failure(&ChargeFailure {
            gateway_payment_id: Some(payment.id.clone()),
            failure_code: payment.error_code.clone(),
            failure_reason: payment.error_description.clone(),
            occurred_at: now,
        })?;

        let transaction = NewPaymentTransaction::failed_charge(
            subscription.id,
            subscription.trader_id,
            subscription.analyst_id,
            &payment.id,
            payment.amount,
            subscription.payment_retry_count,
            payment.error_code,
            payment.error_description,
        );

        match self.store.apply(&subscription, &transaction).await? {
            ApplyOutcome::Applied => {
                self.publish(SubscriptionEvent::PaymentFailed {
                    event_id: EventId::new(),
                    subscription_id: subscription.id,
                    retry_count: subscription.payment_retry_count,
                    grace_period_ends_at: subscription.grace_period_ends_at,
                    occurred_at: now,
                })
                .await;

                if matches!(outcome, FailureOutcome::Suspended)
                    && subscription.status == SubscriptionStatus::Suspended
                {
                    self.publish(SubscriptionEvent::Suspended {
                        event_id: EventId::new(),
                        subscription_id: subscription.id,
                        reason: SuspensionReason::RetriesExhausted,
                        occurred_at: now,
                    })
                    .await;
                }
                Ok(())
            }
            ApplyOutcome::DuplicatePayment => Ok(()),
        }
    }

    /// subscription.cancelled
    async fn handle_cancelled(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let mut subscription = self.find_subscription(event).await?;
        if matches!(
            subscription.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            return Err(WebhookError::Ignored("subscription already closed".to_string()));
        }

        subscription.cancel(crate::domain::subscription::CancelMode::Immediate)?;
        self.subscriptions.update(&subscription).await?;

        self.publish(SubscriptionEvent::Cancelled {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            at_cycle_end: false,
            occurred_at: Timestamp::now(),
        })
        .await;
        Ok(())
    }

    /// subscription.completed - final cycle finished, no further charges
    async fn handle_completed(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let mut subscription = self.find_subscription(event).await?;
        if matches!(
            subscription.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            return Err(WebhookError::Ignored("subscription already closed".to_string()));
        }

        subscription.close_at_period_end()?;
        self.subscriptions.update(&subscription).await?;

        let now = Timestamp::now();
        if subscription.status == SubscriptionStatus::Cancelled {
            self.publish(SubscriptionEvent::Cancelled {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                at_cycle_end: true,
                occurred_at: now,
            })
            .await;
        } else {
            self.publish(SubscriptionEvent::Expired {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                reason: ExpiryReason::CycleCompleted,
                occurred_at: now,
            })
            .await;
        }
        Ok(())
    }

    /// subscription.paused
    async fn handle_paused(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let mut subscription = self.find_subscription(event).await?;
        if subscription.status == SubscriptionStatus::Suspended {
            return Err(WebhookError::Ignored("subscription already suspended".to_string()));
        }

        subscription.pause()?;
        self.subscriptions.update(&subscription).await?;

        self.publish(SubscriptionEvent::Suspended {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            reason: SuspensionReason::Paused,
            occurred_at: Timestamp::now(),
        })
        .await;
        Ok(())
    }

    /// refund.processed - annotate the original captured charge.
    ///
    /// No state transition: refunds touch only the ledger.
    async fn handle_refund(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let payment = event.payment()?;
        let amount = payment.amount;

        match self
            .ledger
            .annotate_refund(
                &payment.id,
                crate::domain::ledger::RefundNote {
                    amount,
                    reason: payment.error_description.clone(),
                },
            )
            .await
        {
            Ok(_) => Ok(()),
            // No captured charge on our side: nothing to annotate
            Err(e) if e.code == crate::domain::foundation::ErrorCode::TransactionNotFound => {
                Err(WebhookError::Ignored(format!(
                    "no captured charge for refunded payment {}",
                    payment.id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// subscription.resumed
    async fn handle_resumed(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let mut subscription = self.find_subscription(event).await?;
        if subscription.status == SubscriptionStatus::Active {
            return Err(WebhookError::Ignored("subscription already active".to_string()));
        }

        subscription.resume()?;
        self.subscriptions.update(&subscription).await?;

        self.publish(SubscriptionEvent::Resumed {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            occurred_at: Timestamp::now(),
        })
        .await;
        Ok(())
    }
}

#[async_trait]
impl GatewayEventHandler for ProcessGatewayEventHandler {
    async fn handle(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        match event.kind() {
            GatewayEventKind::SubscriptionActivated | GatewayEventKind::SubscriptionCharged => {
                self.handle_charge(event).await
            }
            GatewayEventKind::SubscriptionPending
            | GatewayEventKind::SubscriptionHalted
            | GatewayEventKind::PaymentFailed => self.handle_failure(event).await,
            GatewayEventKind::SubscriptionCancelled => self.handle_cancelled(event).await,
            GatewayEventKind::SubscriptionCompleted => self.handle_completed(event).await,
            GatewayEventKind::SubscriptionPaused => self.handle_paused(event).await,
            GatewayEventKind::SubscriptionResumed => self.handle_resumed(event).await,
            GatewayEventKind::RefundProcessed => self.handle_refund(event).await,
            GatewayEventKind::Unknown => Err(WebhookError::Ignored(format!(
                "unhandled event type: {}",
                event.event
            ))),
        }
    }
}
