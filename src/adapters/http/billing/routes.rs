//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, create_checkout, get_analyst_payout, get_analyst_stats,
    get_subscription, handle_gateway_webhook, pause_subscription, resume_subscription,
    upgrade_subscription, verify_checkout, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Trader Endpoints (require trader context)
/// - `POST /checkout` - Start a paid subscription checkout
/// - `POST /checkout/verify` - Verify a browser-redirect confirmation
/// - `GET /subscriptions/:id` - Subscription details
/// - `POST /subscriptions/:id/cancel` - Cancel (immediate or cycle end)
/// - `POST /subscriptions/:id/pause` - Pause
/// - `POST /subscriptions/:id/resume` - Resume
/// - `POST /subscriptions/:id/upgrade` - Move to a higher tier
///
/// ## Analyst Endpoints
/// - `GET /analysts/:id/payout` - Revenue split for a date range
/// - `GET /analysts/:id/stats` - Ledger statistics for a date range
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/checkout/verify", post(verify_checkout))
        .route("/subscriptions/:id", get(get_subscription))
        .route("/subscriptions/:id/cancel", post(cancel_subscription))
        .route("/subscriptions/:id/pause", post(pause_subscription))
        .route("/subscriptions/:id/resume", post(resume_subscription))
        .route("/subscriptions/:id/upgrade", post(upgrade_subscription))
        .route("/analysts/:id/payout", get(get_analyst_payout))
        .route("/analysts/:id/stats", get(get_analyst_stats))
}

/// Create the webhook router.
///
/// Separate from the billing routes because webhook deliveries carry no
/// trader context; they are authenticated by signature.
///
/// # Routes
/// - `POST /gateway` - Inbound gateway events
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/gateway", post(handle_gateway_webhook))
}

/// Create the complete billing module router.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", billing_router())
///     .with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/webhooks", webhook_routes())
}
