//! Scriptable fake PaymentGateway for tests and local development.
//!
//! Records every call, returns deterministic identifiers, and can be
//! scripted to fail the next call with a specific error (e.g. a timeout,
//! to exercise the "outcome unknown" path).

use crate::ports::{
    CreateCustomerRequest, CreateGatewaySubscriptionRequest, CreatePlanRequest, GatewayCustomer,
    GatewayError, GatewayPlan, GatewayRefund, GatewaySubscriptionHandle, GatewayTransfer,
    PaymentGateway, TransferRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    subscriptions: HashMap<String, GatewaySubscriptionHandle>,
    retry_requests: Vec<String>,
    transfers: Vec<GatewayTransfer>,
    refunds: Vec<GatewayRefund>,
    cancel_requests: Vec<(String, bool)>,
}

/// Deterministic in-process gateway fake.
#[derive(Default)]
pub struct MockPaymentGateway {
    state: Mutex<MockState>,
    counter: AtomicU64,
    fail_next: Mutex<Option<GatewayError>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next call to fail with the given error.
    pub fn fail_next_with(&self, error: GatewayError) {
        *self.fail_next.lock().expect("lock poisoned") = Some(error);
    }

    /// Subscription ids the scheduler asked to retry.
    pub fn retry_requests(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .retry_requests
            .clone()
    }

    /// Transfers issued so far.
    pub fn transfers(&self) -> Vec<GatewayTransfer> {
        self.state.lock().expect("lock poisoned").transfers.clone()
    }

    /// (subscription id, at_cycle_end) cancel calls so far.
    pub fn cancel_requests(&self) -> Vec<(String, bool)> {
        self.state
            .lock()
            .expect("lock poisoned")
            .cancel_requests
            .clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_{:04}", prefix, n)
    }

    fn take_scripted_failure(&self) -> Option<GatewayError> {
        self.fail_next.lock().expect("lock poisoned").take()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_plan(&self, request: CreatePlanRequest) -> Result<GatewayPlan, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let _ = request;
        Ok(GatewayPlan {
            id: self.next_id("plan"),
        })
    }

    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        Ok(GatewayCustomer {
            id: self.next_id("cust"),
            email: request.email,
        })
    }

    async fn create_subscription(
        &self,
        request: CreateGatewaySubscriptionRequest,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let _ = request;
        let handle = GatewaySubscriptionHandle {
            id: self.next_id("gsub"),
            status: "created".to_string(),
            short_url: Some("https://gateway.test/checkout".to_string()),
        };
        self.state
            .lock()
            .expect("lock poisoned")
            .subscriptions
            .insert(handle.id.clone(), handle.clone());
        Ok(handle)
    }

    async fn fetch_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<GatewaySubscriptionHandle>, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .expect("lock poisoned")
            .subscriptions
            .get(gateway_subscription_id)
            .cloned())
    }

    async fn cancel_subscription(
        &self,
        gateway_subscription_id: &str,
        at_cycle_end: bool,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().expect("lock poisoned");
        state
            .cancel_requests
            .push((gateway_subscription_id.to_string(), at_cycle_end));
        let handle = state
            .subscriptions
            .entry(gateway_subscription_id.to_string())
            .or_insert_with(|| GatewaySubscriptionHandle {
                id: gateway_subscription_id.to_string(),
                status: "created".to_string(),
                short_url: None,
            });
        handle.status = if at_cycle_end {
            "active".to_string()
        } else {
            "cancelled".to_string()
        };
        Ok(handle.clone())
    }

    async fn pause_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().expect("lock poisoned");
        let handle = state
            .subscriptions
            .entry(gateway_subscription_id.to_string())
            .or_insert_with(|| GatewaySubscriptionHandle {
                id: gateway_subscription_id.to_string(),
                status: "active".to_string(),
                short_url: None,
            });
        handle.status = "paused".to_string();
        Ok(handle.clone())
    }

    async fn resume_subscription(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewaySubscriptionHandle, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().expect("lock poisoned");
        let handle = state
            .subscriptions
            .entry(gateway_subscription_id.to_string())
            .or_insert_with(|| GatewaySubscriptionHandle {
                id: gateway_subscription_id.to_string(),
                status: "paused".to_string(),
                short_url: None,
            });
        handle.status = "active".to_string();
        Ok(handle.clone())
    }

    async fn retry_charge(&self, gateway_subscription_id: &str) -> Result<(), GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        self.state
            .lock()
            .expect("lock poisoned")
            .retry_requests
            .push(gateway_subscription_id.to_string());
        Ok(())
    }

    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: i64,
    ) -> Result<GatewayRefund, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let refund = GatewayRefund {
            id: self.next_id("rfnd"),
            payment_id: gateway_payment_id.to_string(),
            amount,
            status: "processed".to_string(),
        };
        self.state
            .lock()
            .expect("lock poisoned")
            .refunds
            .push(refund.clone());
        Ok(refund)
    }

    async fn transfer(&self, request: TransferRequest) -> Result<GatewayTransfer, GatewayError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let transfer = GatewayTransfer {
            id: self.next_id("trf"),
            amount: request.amount,
        };
        self.state
            .lock()
            .expect("lock poisoned")
            .transfers
            .push(transfer.clone());
        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::AnalystId;
    use crate::domain::subscription::BillingCycle;

    #[tokio::test]
    async fn create_subscription_returns_deterministic_handle() {
        let gateway = MockPaymentGateway::new();

        let handle = gateway
            .create_subscription(CreateGatewaySubscriptionRequest {
                plan_id: "plan_1".to_string(),
                customer_id: "cust_1".to_string(),
                total_cycles: 12,
            })
            .await
            .unwrap();

        assert!(handle.id.starts_with("gsub_"));
        assert_eq!(handle.status, "created");

        let fetched = gateway.fetch_subscription(&handle.id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next_with(GatewayError::timeout("scripted"));

        let first = gateway
            .create_plan(CreatePlanRequest {
                analyst_id: AnalystId::new(),
                name: "Premium".to_string(),
                billing_cycle: BillingCycle::Monthly,
                amount: 99_900,
            })
            .await;
        assert!(first.is_err());

        let second = gateway
            .create_plan(CreatePlanRequest {
                analyst_id: AnalystId::new(),
                name: "Premium".to_string(),
                billing_cycle: BillingCycle::Monthly,
                amount: 99_900,
            })
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn retry_requests_are_recorded() {
        let gateway = MockPaymentGateway::new();
        gateway.retry_charge("gsub_9").await.unwrap();
        assert_eq!(gateway.retry_requests(), vec!["gsub_9".to_string()]);
    }

    #[tokio::test]
    async fn cancel_records_mode() {
        let gateway = MockPaymentGateway::new();
        gateway.cancel_subscription("gsub_1", true).await.unwrap();
        gateway.cancel_subscription("gsub_1", false).await.unwrap();

        assert_eq!(
            gateway.cancel_requests(),
            vec![("gsub_1".to_string(), true), ("gsub_1".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn transfer_returns_transfer_id_for_idempotency() {
        let gateway = MockPaymentGateway::new();
        let transfer = gateway
            .transfer(TransferRequest {
                analyst_id: AnalystId::new(),
                linked_account_id: "acc_1".to_string(),
                amount: 80_000,
                reference: "payout-2024-01".to_string(),
            })
            .await
            .unwrap();

        assert!(transfer.id.starts_with("trf_"));
        assert_eq!(gateway.transfers().len(), 1);
    }
}
