//! End-to-end billing lifecycle tests over in-memory adapters.
//!
//! Drives the real handlers and pipeline the way production wires them:
//! checkout through the application layer, gateway events through the
//! durable inbox, sweeps through the scheduler.

use std::sync::Arc;

use signaldesk::adapters::events::InMemoryEventPublisher;
use signaldesk::adapters::gateway::MockPaymentGateway;
use signaldesk::adapters::memory::{
    InMemoryBillingStore, InMemoryCatalog, InMemoryPaymentLedger, InMemorySubscriptionRepository,
    InMemoryWebhookInbox,
};
use signaldesk::adapters::scheduler::BillingSweeper;
use signaldesk::application::handlers::billing::{
    CalculatePayoutHandler, CalculatePayoutQuery, CreateSubscriptionCommand,
    CreateSubscriptionHandler, ProcessGatewayEventHandler,
};
use signaldesk::config::SchedulerConfig;
use signaldesk::domain::billing::{DiscountCode, DiscountKind, SubscriptionTier};
use signaldesk::domain::foundation::{AnalystId, DiscountCodeId, TierId, Timestamp, TraderId};
use signaldesk::domain::ledger::TransactionStatus;
use signaldesk::domain::subscription::{BillingCycle, SubscriptionStatus};
use signaldesk::domain::webhook::{
    AcceptOutcome, GatewayEvent, GatewayEventPayload, GatewayPaymentEntity,
    GatewaySubscriptionEntity, InboundEventPipeline,
};
use signaldesk::ports::{SubscriptionRepository, WebhookInbox};

type Pipeline =
    InboundEventPipeline<Arc<InMemoryWebhookInbox>, Arc<ProcessGatewayEventHandler>>;

struct World {
    subscriptions: Arc<InMemorySubscriptionRepository>,
    catalog: Arc<InMemoryCatalog>,
    ledger: Arc<InMemoryPaymentLedger>,
    gateway: Arc<MockPaymentGateway>,
    publisher: Arc<InMemoryEventPublisher>,
    inbox: Arc<InMemoryWebhookInbox>,
    pipeline: Arc<Pipeline>,
    analyst_id: AnalystId,
    tier: SubscriptionTier,
}

impl World {
    fn new() -> Self {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let inbox = Arc::new(InMemoryWebhookInbox::new());

        let store = Arc::new(InMemoryBillingStore::new(
            subscriptions.as_ref().clone(),
            ledger.as_ref().clone(),
        ));
        let router = Arc::new(ProcessGatewayEventHandler::new(
            subscriptions.clone(),
            ledger.clone(),
            store,
            publisher.clone(),
        ));
        let pipeline = Arc::new(InboundEventPipeline::new(inbox.clone(), router));

        let analyst_id = AnalystId::new();
        let tier = SubscriptionTier {
            id: TierId::new(),
            analyst_id,
            name: "Premium Signals".to_string(),
            monthly_price: 99_900,
            yearly_price: 999_000,
            features: vec!["intraday-calls".to_string(), "chat".to_string()],
            max_subscribers: None,
            active: true,
            created_at: Timestamp::now(),
        };
        catalog.insert_tier(tier.clone());

        Self {
            subscriptions,
            catalog,
            ledger,
            gateway,
            publisher,
            inbox,
            pipeline,
            analyst_id,
            tier,
        }
    }

    fn checkout_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.catalog.clone(),
            self.gateway.clone(),
        )
    }

    async fn checkout(&self, trader_id: TraderId, discount_code: Option<&str>) -> String {
        let details = self
            .checkout_handler()
            .handle(CreateSubscriptionCommand {
                trader_id,
                tier_id: self.tier.id,
                billing_cycle: BillingCycle::Monthly,
                discount_code: discount_code.map(str::to_string),
                trader_email: "trader@example.com".to_string(),
                trader_name: None,
            })
            .await
            .expect("checkout succeeds");
        details.gateway_subscription_id
    }

    /// Deliver an event through the full accept-then-process path.
    async fn deliver(&self, event: GatewayEvent) {
        match self.pipeline.accept(&event).await.expect("accept") {
            AcceptOutcome::Accepted => {
                self.pipeline.process(&event).await.expect("process");
            }
            AcceptOutcome::AlreadySeen => {}
        }
    }

    fn sweeper(&self) -> BillingSweeper<Arc<InMemoryWebhookInbox>, Arc<ProcessGatewayEventHandler>> {
        BillingSweeper::new(
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.publisher.clone(),
            self.pipeline.clone(),
            SchedulerConfig::default(),
        )
    }
}

fn charge_event(delivery_id: &str, gateway_sub: &str, payment_id: &str, amount: i64) -> GatewayEvent {
    GatewayEvent {
        id: delivery_id.to_string(),
        event: "subscription.charged".to_string(),
        payload: GatewayEventPayload {
            subscription: Some(GatewaySubscriptionEntity {
                id: gateway_sub.to_string(),
                plan_id: None,
                status: Some("active".to_string()),
                current_end: None,
            }),
            payment: Some(GatewayPaymentEntity {
                id: payment_id.to_string(),
                amount,
                status: Some("captured".to_string()),
                error_code: None,
                error_description: None,
                method: Some("upi".to_string()),
            }),
        },
        created_at: 1_705_276_800,
    }
}

fn failure_event(delivery_id: &str, gateway_sub: &str, payment_id: &str) -> GatewayEvent {
    GatewayEvent {
        id: delivery_id.to_string(),
        event: "subscription.pending".to_string(),
        payload: GatewayEventPayload {
            subscription: Some(GatewaySubscriptionEntity {
                id: gateway_sub.to_string(),
                plan_id: None,
                status: Some("pending".to_string()),
                current_end: None,
            }),
            payment: Some(GatewayPaymentEntity {
                id: payment_id.to_string(),
                amount: 89_910,
                status: Some("failed".to_string()),
                error_code: Some("BAD_FUNDS".to_string()),
                error_description: Some("insufficient funds".to_string()),
                method: None,
            }),
        },
        created_at: 1_705_276_800,
    }
}

#[tokio::test]
async fn checkout_then_activation_webhook_goes_live() {
    let world = World::new();
    let trader = TraderId::new();

    let gateway_sub = world.checkout(trader, None).await;
    assert_eq!(
        world.subscriptions.snapshot()[0].status,
        SubscriptionStatus::PendingPayment
    );

    world
        .deliver(charge_event("evt_1", &gateway_sub, "pay_1", 99_900))
        .await;

    let sub = world.subscriptions.snapshot().remove(0);
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(sub.has_access());
    assert_eq!(world.ledger.snapshot().len(), 1);
    assert_eq!(
        world.publisher.published_types(),
        vec!["subscription.activated.v1"]
    );
}

#[tokio::test]
async fn discounted_checkout_charges_final_price() {
    let world = World::new();
    world.catalog.insert_discount(DiscountCode {
        id: DiscountCodeId::new(),
        analyst_id: world.analyst_id,
        code: "LAUNCH10".to_string(),
        kind: DiscountKind::Percentage {
            percent: 10,
            max_discount: None,
        },
        applicable_tiers: None,
        cycle_restriction: None,
        usage_limit: None,
        per_user_limit: None,
        valid_from: Timestamp::now().minus_days(1),
        valid_until: None,
        first_time_only: false,
        usage_count: 0,
        active: true,
    });

    world.checkout(TraderId::new(), Some("LAUNCH10")).await;

    let sub = world.subscriptions.snapshot().remove(0);
    // 99900 at 10%: 9990 off, 89910 due
    assert_eq!(sub.price_paid, 99_900);
    assert_eq!(sub.discount_applied, 9_990);
    assert_eq!(sub.final_price, 89_910);
}

#[tokio::test]
async fn duplicate_deliveries_produce_one_ledger_row_and_one_transition() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;

    // Same delivery id five times, then a fresh delivery id for the same
    // payment: every path must collapse to one ledger row
    for _ in 0..5 {
        world
            .deliver(charge_event("evt_dup", &gateway_sub, "pay_1", 99_900))
            .await;
    }
    world
        .deliver(charge_event("evt_other", &gateway_sub, "pay_1", 99_900))
        .await;

    assert_eq!(world.ledger.snapshot().len(), 1);
    assert_eq!(
        world.publisher.published_types(),
        vec!["subscription.activated.v1"]
    );
}

#[tokio::test]
async fn concurrent_identical_deliveries_never_double_activate() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = world.pipeline.clone();
        let event = charge_event("evt_race", &gateway_sub, "pay_race", 99_900);
        handles.push(tokio::spawn(async move {
            if let AcceptOutcome::Accepted = pipeline.accept(&event).await? {
                pipeline.process(&event).await?;
            }
            Ok::<(), signaldesk::domain::webhook::WebhookError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // One activation side effect: one ledger row, one published event
    assert_eq!(world.ledger.snapshot().len(), 1);
    assert_eq!(
        world.publisher.published_types(),
        vec!["subscription.activated.v1"]
    );
    assert_eq!(
        world.subscriptions.snapshot()[0].status,
        SubscriptionStatus::Active
    );
}

#[tokio::test]
async fn renewals_extend_in_place_with_no_new_rows() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;
    world
        .deliver(charge_event("evt_0", &gateway_sub, "pay_0", 99_900))
        .await;

    let expires_after_activation = world.subscriptions.snapshot()[0]
        .expires_at
        .expect("set on activation");

    world
        .deliver(charge_event("evt_1", &gateway_sub, "pay_1", 99_900))
        .await;
    world
        .deliver(charge_event("evt_2", &gateway_sub, "pay_2", 99_900))
        .await;

    // Still a single subscription row, expiry pushed two calendar months
    let rows = world.subscriptions.snapshot();
    assert_eq!(rows.len(), 1);
    let expected = expires_after_activation
        .add_calendar_months(1)
        .add_calendar_months(1);
    assert_eq!(rows[0].expires_at, Some(expected));
    assert_eq!(world.ledger.snapshot().len(), 3);
}

#[tokio::test]
async fn three_failures_suspend_then_grace_sweep_closes() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;
    world
        .deliver(charge_event("evt_0", &gateway_sub, "pay_0", 99_900))
        .await;

    for (evt, pay) in [("evt_f1", "pay_f1"), ("evt_f2", "pay_f2"), ("evt_f3", "pay_f3")] {
        world.deliver(failure_event(evt, &gateway_sub, pay)).await;
    }

    let mut sub = world.subscriptions.snapshot().remove(0);
    assert_eq!(sub.status, SubscriptionStatus::Suspended);
    assert_eq!(sub.payment_retry_count, 3);
    assert!(!sub.has_access());

    // Push the subscription past its grace deadline and sweep
    sub.grace_period_ends_at = Some(Timestamp::now().minus_days(1));
    world.subscriptions.update(&sub).await.unwrap();

    let report = world.sweeper().sweep().await;
    assert_eq!(report.grace_closed, 1);
    assert_eq!(
        world.subscriptions.snapshot().remove(0).status,
        SubscriptionStatus::Expired
    );
}

#[tokio::test]
async fn expiry_sweep_closes_subscription_whose_renewal_never_arrived() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;
    world
        .deliver(charge_event("evt_0", &gateway_sub, "pay_0", 99_900))
        .await;

    let mut sub = world.subscriptions.snapshot().remove(0);
    sub.expires_at = Some(Timestamp::now().minus_days(2));
    world.subscriptions.update(&sub).await.unwrap();

    let report = world.sweeper().sweep().await;

    assert_eq!(report.expired, 1);
    let closed = world.subscriptions.snapshot().remove(0);
    assert_eq!(closed.status, SubscriptionStatus::Expired);
    assert!(!closed.auto_renewal);
}

#[tokio::test]
async fn failed_inbox_entries_are_redriven_by_the_sweeper() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;

    // Accept the delivery but simulate a crash before processing
    let event = charge_event("evt_crash", &gateway_sub, "pay_1", 99_900);
    assert_eq!(
        world.pipeline.accept(&event).await.unwrap(),
        AcceptOutcome::Accepted
    );
    assert_eq!(
        world.subscriptions.snapshot()[0].status,
        SubscriptionStatus::PendingPayment
    );

    // The sweeper finds the unprocessed entry and drives it to completion
    let report = world.sweeper().sweep().await;

    assert_eq!(report.redelivered, 1);
    assert_eq!(
        world.subscriptions.snapshot()[0].status,
        SubscriptionStatus::Active
    );
    assert!(world.inbox.find("evt_crash").await.unwrap().is_some());
}

#[tokio::test]
async fn payout_reconciles_to_captured_ledger_revenue() {
    let world = World::new();
    let gateway_sub = world.checkout(TraderId::new(), None).await;
    world
        .deliver(charge_event("evt_0", &gateway_sub, "pay_0", 99_900))
        .await;
    world
        .deliver(charge_event("evt_1", &gateway_sub, "pay_1", 99_900))
        .await;
    // A failed charge must not count toward revenue
    world
        .deliver(failure_event("evt_f", &gateway_sub, "pay_f"))
        .await;

    let statement = CalculatePayoutHandler::new(world.ledger.clone())
        .handle(CalculatePayoutQuery {
            analyst_id: world.analyst_id,
            from: Timestamp::now().minus_days(1),
            to: Timestamp::now().add_days(1),
        })
        .await
        .unwrap();

    assert_eq!(statement.total_revenue, 199_800);
    assert_eq!(statement.platform_commission, 39_960);
    assert_eq!(statement.analyst_payout, 159_840);
    assert_eq!(
        statement.platform_commission + statement.analyst_payout,
        statement.total_revenue
    );

    let captured: Vec<_> = world
        .ledger
        .snapshot()
        .into_iter()
        .filter(|t| t.status == TransactionStatus::Captured)
        .collect();
    assert_eq!(captured.iter().map(|t| t.amount).sum::<i64>(), 199_800);
}
