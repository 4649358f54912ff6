//! BillingSweeper - periodic retry, expiry, grace, and redelivery sweeps.
//!
//! Runs on a fixed interval, independent of any request. Four sweeps per
//! tick:
//!
//! - **payment retry**: subscriptions with retry budget left whose last
//!   attempt is older than the backoff window get a gateway retry; the
//!   outcome arrives later as a webhook
//! - **expiry**: active subscriptions whose `expires_at` passed with no
//!   renewal webhook are force-closed
//! - **grace**: suspended subscriptions past the 7-day grace deadline are
//!   force-closed rather than silently retried forever
//! - **inbox redelivery**: `received`/`failed` webhook inbox entries are
//!   redriven, dead-lettering once the attempt budget is spent
//!
//! ## Graceful Shutdown
//!
//! The service listens on a watch channel and finishes the current sweep
//! before stopping.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time;

use crate::config::SchedulerConfig;
use crate::domain::foundation::{EventId, SerializableDomainEvent, Timestamp};
use crate::domain::subscription::{
    ExpiryReason, Subscription, SubscriptionEvent, SubscriptionStatus, MAX_PAYMENT_RETRIES,
};
use crate::domain::webhook::{GatewayEventHandler, InboundEventPipeline};
use crate::ports::{EventPublisher, PaymentGateway, SubscriptionRepository, WebhookInbox};

/// Counters from one sweep tick, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub retries_requested: u32,
    pub expired: u32,
    pub grace_closed: u32,
    pub redelivered: u32,
}

/// Periodic billing maintenance service.
pub struct BillingSweeper<I: WebhookInbox, H: GatewayEventHandler> {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    pipeline: Arc<InboundEventPipeline<I, H>>,
    config: SchedulerConfig,
}

impl<I: WebhookInbox, H: GatewayEventHandler> BillingSweeper<I, H> {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        pipeline: Arc<InboundEventPipeline<I, H>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            subscriptions,
            gateway,
            publisher,
            pipeline,
            config,
        }
    }

    /// Run the sweep loop until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.sweep_interval());

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        let report = self.sweep().await;
                        tracing::info!(?report, "billing sweeper shutting down");
                        return;
                    }
                }
                _ = interval.tick() => {
                    let report = self.sweep().await;
                    if report != SweepReport::default() {
                        tracing::info!(?report, "billing sweep complete");
                    }
                }
            }
        }
    }

    /// One full sweep tick.
    pub async fn sweep(&self) -> SweepReport {
        let (retries_requested, expired, grace_closed) = futures::join!(
            self.payment_retry_sweep(),
            self.expiry_sweep(),
            self.grace_sweep(),
        );
        let redelivered = self.redelivery_sweep().await;

        SweepReport {
            retries_requested,
            expired,
            grace_closed,
            redelivered,
        }
    }

    /// Ask the gateway to retry charges for subscriptions with budget left.
    async fn payment_retry_sweep(&self) -> u32 {
        let cutoff = Timestamp::now().minus_hours(self.config.retry_backoff_hours as i64);
        let due = match self
            .subscriptions
            .due_for_payment_retry(cutoff, MAX_PAYMENT_RETRIES)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "retry sweep query failed");
                return 0;
            }
        };

        let mut requested = 0;
        for subscription in due.into_iter().take(self.config.batch_size as usize) {
            let Some(gateway_subscription_id) = subscription.gateway_subscription_id.as_deref()
            else {
                continue;
            };
            match self.gateway.retry_charge(gateway_subscription_id).await {
                // The charge outcome arrives as a webhook; nothing local
                // changes here
                Ok(()) => requested += 1,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        error = %e,
                        "gateway retry deferred to next sweep"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        subscription_id = %subscription.id,
                        error = %e,
                        "gateway retry rejected"
                    );
                }
            }
        }
        requested
    }

    /// Force-expire active subscriptions whose renewal never arrived.
    async fn expiry_sweep(&self) -> u32 {
        let lapsed = match self.subscriptions.lapsed_active(Timestamp::now()).await {
            Ok(lapsed) => lapsed,
            Err(e) => {
                tracing::error!(error = %e, "expiry sweep query failed");
                return 0;
            }
        };

        let mut closed = 0;
        for subscription in lapsed.into_iter().take(self.config.batch_size as usize) {
            if self
                .close_subscription(subscription, ExpiryReason::RenewalMissed)
                .await
            {
                closed += 1;
            }
        }
        closed
    }

    /// Force-close suspended subscriptions past the grace deadline.
    async fn grace_sweep(&self) -> u32 {
        let elapsed = match self.subscriptions.grace_elapsed(Timestamp::now()).await {
            Ok(elapsed) => elapsed,
            Err(e) => {
                tracing::error!(error = %e, "grace sweep query failed");
                return 0;
            }
        };

        let mut closed = 0;
        for subscription in elapsed.into_iter().take(self.config.batch_size as usize) {
            if self
                .close_subscription(subscription, ExpiryReason::GraceElapsed)
                .await
            {
                closed += 1;
            }
        }
        closed
    }

    async fn close_subscription(
        &self,
        mut subscription: Subscription,
        reason: ExpiryReason,
    ) -> bool {
        let result = match reason {
            ExpiryReason::GraceElapsed => subscription.force_close_after_grace(),
            _ => subscription.close_at_period_end(),
        };
        if let Err(e) = result {
            tracing::error!(subscription_id = %subscription.id, error = %e, "forced close rejected");
            return false;
        }
        if let Err(e) = self.subscriptions.update(&subscription).await {
            tracing::error!(subscription_id = %subscription.id, error = %e, "forced close not persisted");
            return false;
        }

        let now = Timestamp::now();
        let event = if subscription.status == SubscriptionStatus::Cancelled {
            SubscriptionEvent::Cancelled {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                at_cycle_end: true,
                occurred_at: now,
            }
        } else {
            SubscriptionEvent::Expired {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                reason,
                occurred_at: now,
            }
        };
        if let Err(e) = self.publisher.publish(event.to_envelope()).await {
            tracing::warn!(subscription_id = %subscription.id, error = %e, "event publish failed after forced close");
        }
        true
    }

    /// Redrive pending/failed inbox entries.
    async fn redelivery_sweep(&self) -> u32 {
        let due = match self
            .pipeline
            .due_for_redelivery(self.config.redelivery_batch_size)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "redelivery sweep query failed");
                return 0;
            }
        };

        let mut redelivered = 0;
        for record in due {
            match self.pipeline.redeliver(&record).await {
                Ok(_) => redelivered += 1,
                Err(e) => {
                    tracing::error!(event_id = %record.event_id, error = %e, "redelivery failed");
                }
            }
        }
        redelivered
    }
}
