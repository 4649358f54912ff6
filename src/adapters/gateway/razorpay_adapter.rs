//! Razorpay implementation of the PaymentGateway port.
//!
//! Thin REST client with basic auth and a bounded per-request timeout.
//! A timeout surfaces as `GatewayErrorCode::Timeout` ("outcome unknown");
//! the caller must not assume the operation failed.

use crate::config::GatewayConfig;
use crate::domain::subscription::BillingCycle;
use crate::ports::{
    CreateCustomerRequest, CreateGatewaySubscriptionRequest, CreatePlanRequest, GatewayCustomer,
    GatewayError, GatewayErrorCode, GatewayPlan, GatewayRefund, GatewaySubscriptionHandle,
    GatewayTransfer, PaymentGateway, TransferRequest,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::wire_types::{
    ApiErrorResponse, CancelRequest, CustomerRequest, CustomerResponse, PlanItem, PlanRequest,
    PlanResponse, RefundRequest, RefundResponse, SubscriptionRequest, SubscriptionResponse,
    TransferNotes, TransferResponse, TransferWireRequest,
};

/// Razorpay REST adapter.
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    /// Creates an adapter from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the HTTP client cannot be constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                GatewayError::new(GatewayErrorCode::Unknown, format!("HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret().to_string(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::decode(response).await
    }

    async fn post_empty<R: DeserializeOwned>(&self, path: &str) -> Result<R, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::decode(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| {
                GatewayError::new(
                    GatewayErrorCode::Provider,
                    format!("Unreadable gateway response: {}", e),
                )
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status_error(status, &body))
    }

    fn period_for(cycle: BillingCycle) -> &'static str {
        match cycle {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout("gateway request timed out")
    } else if err.is_connect() {
        GatewayError::network(format!("connection failed: {}", err))
    } else {
        GatewayError::network(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> GatewayError {
    let (provider_code, description) = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => (parsed.error.code, parsed.error.description),
        Err(_) => (None, None),
    };
    let message = description.unwrap_or_else(|| format!("gateway returned {}", status));

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorCode::Authentication,
        StatusCode::NOT_FOUND => GatewayErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => GatewayErrorCode::RateLimited,
        s if s.is_client_error() => GatewayErrorCode::InvalidRequest,
        s if s.is_server_error() => GatewayErrorCode::Provider,
        _ => GatewayErrorCode::Unknown,
    };

    let mut error = GatewayError::new(code, message);
    if let Some(provider_code) = provider_code {
        error = error.with_provider_code(provider_code);
    }
    error
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_plan(&self, request: CreatePlanRequest) -> Result<GatewayPlan, GatewayError> {
        let wire = PlanRequest {
            period: Self::period_for(request.billing_cycle).to_string(),
            interval: 1,
            item: PlanItem {
                name: request.name,
                amount: request.amount,
                currency: "INR".to_string(),
            },
        };

        let response: PlanResponse = self.post("/plans", &wire).await?;
        Ok(GatewayPlan { id: response.id })
    }

    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError> {
        let wire = CustomerRequest {
            name: request.name,
            email: request.email,
            fail_existing: "0".to_string(),
        };

        let response: CustomerResponse = self.post("/customers", &wire).await?;
        Ok(GatewayCustomer {
            id: response.id,
            email: response.email,
        })
    }

    async fn create_subscription(
        &self,
        request: CreateGatewaySubscriptionRequest,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        let wire = SubscriptionRequest {
            plan_id: request.plan_id,
            customer_id: request.customer_id,
            total_count: request.total_cycles,
            customer_notify: 1,
        };

        let response: SubscriptionResponse = self.post("/subscriptions", &wire).await?;
        Ok(GatewaySubscriptionHandle {
            id: response.id,
            status: response.status,
            short_url: response.short_url,
        })
    }

    async fn fetch_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<GatewaySubscriptionHandle>, GatewayError> {
        let path = format!("/subscriptions/{}", gateway_subscription_id);
        match self.get::<SubscriptionResponse>(&path).await {
            Ok(response) => Ok(Some(GatewaySubscriptionHandle {
                id: response.id,
                status: response.status,
                short_url: response.short_url,
            })),
            Err(e) if e.code == GatewayErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn cancel_subscription(
        &self,
        gateway_subscription_id: &str,
        at_cycle_end: bool,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        let path = format!("/subscriptions/{}/cancel", gateway_subscription_id);
        let wire = CancelRequest {
            cancel_at_cycle_end: u8::from(at_cycle_end),
        };

        let response: SubscriptionResponse = self.post(&path, &wire).await?;
        Ok(GatewaySubscriptionHandle {
            id: response.id,
            status: response.status,
            short_url: response.short_url,
        })
    }

    async fn pause_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        let path = format!("/subscriptions/{}/pause", gateway_subscription_id);
        let response: SubscriptionResponse = self.post_empty(&path).await?;
        Ok(GatewaySubscriptionHandle {
            id: response.id,
            status: response.status,
            short_url: response.short_url,
        })
    }

    async fn resume_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        let path = format!("/subscriptions/{}/resume", gateway_subscription_id);
        let response: SubscriptionResponse = self.post_empty(&path).await?;
        Ok(GatewaySubscriptionHandle {
            id: response.id,
            status: response.status,
            short_url: response.short_url,
        })
    }

    async fn retry_charge(&self, gateway_subscription_id: &str) -> Result<(), GatewayError> {
        let path = format!("/subscriptions/{}/retry", gateway_subscription_id);
        let _: serde_json::Value = self.post_empty(&path).await?;
        Ok(())
    }

    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: i64,
    ) -> Result<GatewayRefund, GatewayError> {
        let path = format!("/payments/{}/refund", gateway_payment_id);
        let wire = RefundRequest { amount };

        let response: RefundResponse = self.post(&path, &wire).await?;
        Ok(GatewayRefund {
            id: response.id,
            payment_id: response.payment_id,
            amount: response.amount,
            status: response.status,
        })
    }

    async fn transfer(&self, request: TransferRequest) -> Result<GatewayTransfer, GatewayError> {
        let wire = TransferWireRequest {
            account: request.linked_account_id,
            amount: request.amount,
            currency: "INR".to_string(),
            notes: TransferNotes {
                reference: request.reference,
            },
        };

        let response: TransferResponse = self.post("/transfers", &wire).await?;
        Ok(GatewayTransfer {
            id: response.id,
            amount: response.amount,
        })
    }
}
