//! HTTP adapter for billing endpoints.

mod dto;
mod handlers;
mod routes;

pub use handlers::{AuthenticatedTrader, BillingApiError, BillingAppState, GatewayPipeline};
pub use routes::{billing_router, billing_routes, webhook_routes};
