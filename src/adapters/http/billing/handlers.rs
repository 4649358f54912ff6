//! HTTP handlers for billing endpoints.
//!
//! These handlers connect axum routes to application-layer command
//! handlers. The webhook endpoint is special: it verifies the signature,
//! persists the event to the durable inbox, acknowledges the gateway,
//! and only then processes the event in a spawned task.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::handlers::billing::{
    CalculatePayoutHandler, CalculatePayoutQuery, CancelSubscriptionCommand,
    CancelSubscriptionHandler, CreateSubscriptionCommand, CreateSubscriptionHandler,
    PauseSubscriptionCommand, PauseSubscriptionHandler, ProcessGatewayEventHandler,
    ResumeSubscriptionCommand, ResumeSubscriptionHandler, UpgradeSubscriptionCommand,
    UpgradeSubscriptionHandler, VerifyCheckoutCommand, VerifyCheckoutHandler,
};
use crate::domain::foundation::{AnalystId, SubscriptionId, TierId, Timestamp, TraderId};
use crate::domain::subscription::{CancelMode, SubscriptionError};
use crate::domain::webhook::{
    AcceptOutcome, CheckoutSignatureVerifier, GatewayEvent, InboundEventPipeline, ProcessResult,
    WebhookSignatureVerifier,
};
use crate::ports::{
    BillingStore, CatalogRepository, EventPublisher, PaymentGateway, PaymentLedger,
    SubscriptionRepository, WebhookInbox,
};

use super::dto::{
    CancelRequest, CheckoutResponse, CreateCheckoutRequest, ErrorResponse, PayoutQuery,
    PayoutResponse, SubscriptionResponse, UpgradeRequest, VerifyCheckoutRequest,
    VerifyCheckoutResponse,
};

/// Signature header set by the gateway on webhook deliveries.
const SIGNATURE_HEADER: &str = "x-razorpay-signature";
/// Delivery id header used for inbox deduplication.
const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Pipeline wired to the production event router.
pub type GatewayPipeline =
    InboundEventPipeline<Arc<dyn WebhookInbox>, Arc<ProcessGatewayEventHandler>>;

/// Shared application state containing all billing dependencies.
#[derive(Clone)]
pub struct BillingAppState {
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub publisher: Arc<dyn EventPublisher>,
    pub webhook_verifier: Arc<WebhookSignatureVerifier>,
    pub checkout_verifier: Arc<CheckoutSignatureVerifier>,
    pub pipeline: Arc<GatewayPipeline>,
}

impl BillingAppState {
    /// Wires the state, building the inbound pipeline over the inbox and
    /// the event router.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: Arc<dyn CatalogRepository>,
        ledger: Arc<dyn PaymentLedger>,
        store: Arc<dyn BillingStore>,
        inbox: Arc<dyn WebhookInbox>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        webhook_verifier: WebhookSignatureVerifier,
        checkout_verifier: CheckoutSignatureVerifier,
    ) -> Self {
        let router = Arc::new(ProcessGatewayEventHandler::new(
            subscriptions.clone(),
            ledger.clone(),
            store,
            publisher.clone(),
        ));
        let pipeline = Arc::new(InboundEventPipeline::new(inbox, router));

        Self {
            subscriptions,
            catalog,
            ledger,
            gateway,
            publisher,
            webhook_verifier: Arc::new(webhook_verifier),
            checkout_verifier: Arc::new(checkout_verifier),
            pipeline,
        }
    }

    fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.catalog.clone(),
            self.gateway.clone(),
        )
    }

    fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.publisher.clone(),
        )
    }

    fn pause_handler(&self) -> PauseSubscriptionHandler {
        PauseSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.publisher.clone(),
        )
    }

    fn resume_handler(&self) -> ResumeSubscriptionHandler {
        ResumeSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.publisher.clone(),
        )
    }

    fn upgrade_handler(&self) -> UpgradeSubscriptionHandler {
        UpgradeSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.catalog.clone(),
            self.gateway.clone(),
            self.publisher.clone(),
        )
    }

    fn payout_handler(&self) -> CalculatePayoutHandler {
        CalculatePayoutHandler::new(self.ledger.clone())
    }

    fn verify_checkout_handler(&self) -> VerifyCheckoutHandler {
        VerifyCheckoutHandler::new((*self.checkout_verifier).clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Authenticated trader context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated trader extracted from the request.
///
/// In production this comes from the session layer; the engine only needs
/// the id, carried in the `X-Trader-Id` header set by the edge.
#[derive(Debug, Clone)]
pub struct AuthenticatedTrader {
    pub trader_id: TraderId,
}

/// Rejection for missing/invalid trader context.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedTrader
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let trader_id = parts
            .headers
            .get("x-trader-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<TraderId>().ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedTrader { trader_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error mapping
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper mapping domain errors onto HTTP responses.
pub struct BillingApiError(SubscriptionError);

impl From<SubscriptionError> for BillingApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SubscriptionError::InvalidWebhookSignature
            | SubscriptionError::InvalidCheckoutSignature => {
                (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE")
            }
            SubscriptionError::NotFound => (StatusCode::NOT_FOUND, "SUBSCRIPTION_NOT_FOUND"),
            SubscriptionError::TierNotFound => (StatusCode::NOT_FOUND, "TIER_NOT_FOUND"),
            SubscriptionError::AlreadySubscribed => {
                (StatusCode::CONFLICT, "DUPLICATE_SUBSCRIPTION")
            }
            SubscriptionError::TierFull => (StatusCode::CONFLICT, "TIER_FULL"),
            SubscriptionError::DiscountRejected(_) => {
                (StatusCode::BAD_REQUEST, "DISCOUNT_REJECTED")
            }
            SubscriptionError::InvalidState { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE")
            }
            SubscriptionError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            SubscriptionError::GatewayOutcomeUnknown => {
                (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_OUTCOME_UNKNOWN")
            }
            SubscriptionError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let error = ErrorResponse::new(code, self.0.to_string());
        (status, Json(error)).into_response()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook intake
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/gateway - inbound gateway events.
///
/// Order matters:
/// 1. signature check - reject 401 before any parsing
/// 2. parse - 400 on malformed bodies
/// 3. persist to the inbox - duplicate delivery ids ack immediately
/// 4. ack 200, then process asynchronously
///
/// A failure to *persist* returns 500 so the gateway redelivers (the
/// inbox row is the only durable copy); failures to *process* never
/// reach the gateway.
pub async fn handle_gateway_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !state.webhook_verifier.verify(&body, signature) {
        let error = ErrorResponse::new("INVALID_SIGNATURE", "Invalid webhook signature");
        return (StatusCode::UNAUTHORIZED, Json(error)).into_response();
    }

    let delivery_id = headers.get(EVENT_ID_HEADER).and_then(|v| v.to_str().ok());
    let event = match GatewayEvent::parse(&body, delivery_id) {
        Ok(event) => event,
        Err(e) => {
            let error = ErrorResponse::new("MALFORMED_EVENT", e.to_string());
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    };

    match state.pipeline.accept(&event).await {
        Ok(AcceptOutcome::Accepted) => {
            let pipeline = state.pipeline.clone();
            tokio::spawn(async move {
                match pipeline.process(&event).await {
                    Ok(ProcessResult::Processed) => {}
                    Ok(ProcessResult::Ignored { reason }) => {
                        tracing::debug!(event_id = %event.id, %reason, "webhook ignored");
                    }
                    Ok(ProcessResult::Failed { error }) => {
                        tracing::warn!(event_id = %event.id, %error, "webhook processing failed; will redrive");
                    }
                    Ok(ProcessResult::DeadLettered { error }) => {
                        tracing::error!(event_id = %event.id, %error, "webhook dead-lettered; manual reconciliation required");
                    }
                    Err(e) => {
                        tracing::error!(event_id = %event.id, error = %e, "webhook pipeline error");
                    }
                }
            });
            StatusCode::OK.into_response()
        }
        Ok(AcceptOutcome::AlreadySeen) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "failed to persist webhook; asking gateway to redeliver");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

/// POST /billing/checkout - start a paid subscription.
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.create_subscription_handler();
    let details = handler
        .handle(CreateSubscriptionCommand {
            trader_id: trader.trader_id,
            tier_id: TierId::from_uuid(request.tier_id),
            billing_cycle: request.billing_cycle,
            discount_code: request.discount_code,
            trader_email: request.email,
            trader_name: request.name,
        })
        .await?;

    Ok(Json(CheckoutResponse::from(details)))
}

/// POST /billing/checkout/verify - browser redirect confirmation.
pub async fn verify_checkout(
    State(state): State<BillingAppState>,
    Json(request): Json<VerifyCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.verify_checkout_handler();
    handler.handle(&VerifyCheckoutCommand {
        order_id: request.order_id,
        payment_id: request.payment_id,
        signature: request.signature,
    })?;

    Ok(Json(VerifyCheckoutResponse { verified: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription management
// ════════════════════════════════════════════════════════════════════════════════

/// GET /billing/subscriptions/:id
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BillingApiError> {
    let subscription = state
        .subscriptions
        .find_by_id(&SubscriptionId::from_uuid(id))
        .await
        .map_err(SubscriptionError::from)?
        .filter(|s| s.trader_id == trader.trader_id)
        .ok_or(SubscriptionError::NotFound)?;

    Ok(Json(SubscriptionResponse::from(&subscription)))
}

/// POST /billing/subscriptions/:id/cancel
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.cancel_handler();
    handler
        .handle(CancelSubscriptionCommand {
            subscription_id: SubscriptionId::from_uuid(id),
            trader_id: trader.trader_id,
            mode: if request.at_cycle_end {
                CancelMode::AtCycleEnd
            } else {
                CancelMode::Immediate
            },
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /billing/subscriptions/:id/pause
pub async fn pause_subscription(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BillingApiError> {
    state
        .pause_handler()
        .handle(PauseSubscriptionCommand {
            subscription_id: SubscriptionId::from_uuid(id),
            trader_id: trader.trader_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /billing/subscriptions/:id/resume
pub async fn resume_subscription(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BillingApiError> {
    state
        .resume_handler()
        .handle(ResumeSubscriptionCommand {
            subscription_id: SubscriptionId::from_uuid(id),
            trader_id: trader.trader_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /billing/subscriptions/:id/upgrade
pub async fn upgrade_subscription(
    State(state): State<BillingAppState>,
    trader: AuthenticatedTrader,
    Path(id): Path<Uuid>,
    Json(request): Json<UpgradeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    state
        .upgrade_handler()
        .handle(UpgradeSubscriptionCommand {
            subscription_id: SubscriptionId::from_uuid(id),
            trader_id: trader.trader_id,
            new_tier_id: TierId::from_uuid(request.tier_id),
            discount_code: request.discount_code,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Analyst reporting
// ════════════════════════════════════════════════════════════════════════════════

/// GET /billing/analysts/:id/payout
pub async fn get_analyst_payout(
    State(state): State<BillingAppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PayoutQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let from = query.from.unwrap_or_else(|| Timestamp::now().minus_days(30));
    let to = query.to.unwrap_or_else(Timestamp::now);

    let statement = state
        .payout_handler()
        .handle(CalculatePayoutQuery {
            analyst_id: AnalystId::from_uuid(id),
            from,
            to,
        })
        .await?;

    Ok(Json(PayoutResponse::from(statement)))
}

/// GET /billing/analysts/:id/stats
pub async fn get_analyst_stats(
    State(state): State<BillingAppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PayoutQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let from = query.from.unwrap_or_else(|| Timestamp::now().minus_days(30));
    let to = query.to.unwrap_or_else(Timestamp::now);

    let stats = state
        .ledger
        .stats_for_analyst(&AnalystId::from_uuid(id), from, to)
        .await
        .map_err(SubscriptionError::from)?;

    Ok(Json(stats))
}
