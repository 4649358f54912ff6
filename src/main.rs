//! Signaldesk server binary.
//!
//! Wires Postgres adapters, the Razorpay gateway client, the Redis event
//! publisher, the billing sweeper, and the HTTP surface, then serves
//! until SIGINT.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signaldesk::adapters::events::RedisEventPublisher;
use signaldesk::adapters::gateway::RazorpayGateway;
use signaldesk::adapters::http::billing::{billing_router, BillingAppState};
use signaldesk::adapters::postgres::{
    PostgresBillingStore, PostgresCatalogRepository, PostgresPaymentLedger,
    PostgresSubscriptionRepository, PostgresWebhookInbox,
};
use signaldesk::adapters::scheduler::BillingSweeper;
use signaldesk::config::AppConfig;
use signaldesk::domain::webhook::{CheckoutSignatureVerifier, WebhookSignatureVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "signaldesk=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresPaymentLedger::new(pool.clone()));
    let store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let inbox = Arc::new(PostgresWebhookInbox::new(pool.clone()));
    let catalog = Arc::new(PostgresCatalogRepository::new(pool.clone()));
    let gateway = Arc::new(RazorpayGateway::new(&config.gateway)?);
    let publisher = Arc::new(RedisEventPublisher::new(&config.redis)?);

    let state = BillingAppState::new(
        subscriptions.clone(),
        catalog,
        ledger.clone(),
        store,
        inbox,
        gateway.clone(),
        publisher.clone(),
        WebhookSignatureVerifier::new(config.gateway.webhook_secret()),
        CheckoutSignatureVerifier::new(config.gateway.key_secret()),
    );

    // Background sweeper with graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = BillingSweeper::new(
        subscriptions,
        gateway,
        publisher,
        state.pipeline.clone(),
        config.scheduler.clone(),
    );
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let app = axum::Router::new()
        .nest("/api", billing_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    tracing::info!(addr = %config.server.socket_addr(), "signaldesk listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    Ok(())
}
