use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    CheckoutSession, CreateCheckoutSessionRequest, ProductListing, StripeEvent, StripeService,
    StripeServiceError, SubscriptionSnapshot,
};

static COUNTER: AtomicU64 = AtomicU64::new(1);

fn make_id(prefix: &str) -> String {
    format!("{}_{}", prefix, COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// In-memory Stripe stand-in for tests. The `subscription` slot plays the
/// provider's present-tense state: the synchronizer re-fetches from here, so
/// tests can make it diverge from whatever a webhook payload claims.
#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_customers: Arc<Mutex<Vec<(String, String, String)>>>,
    pub deleted_customers: Arc<Mutex<Vec<String>>>,
    pub checkout_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub subscription: Arc<Mutex<Option<SubscriptionSnapshot>>>,
    pub subscription_fetches: Arc<Mutex<Vec<String>>>,
    pub cancel_updates: Arc<Mutex<Vec<(String, bool)>>>,
    pub products: Arc<Mutex<Vec<ProductListing>>>,
    pub events: Arc<Mutex<Vec<StripeEvent>>>,
    pub fail_verification: Arc<Mutex<bool>>,
    pub fail_create_customer: Arc<Mutex<bool>>,
    pub fail_create_session: Arc<Mutex<bool>>,
    pub fail_subscription_fetch: Arc<Mutex<bool>>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription(self, sub: SubscriptionSnapshot) -> Self {
        *self.subscription.lock().unwrap() = Some(sub);
        self
    }

    pub fn set_subscription(&self, sub: Option<SubscriptionSnapshot>) {
        *self.subscription.lock().unwrap() = sub;
    }
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<String, StripeServiceError> {
        if *self.fail_create_customer.lock().unwrap() {
            return Err(StripeServiceError::Api("mock customer failure".into()));
        }
        let id = make_id("cus_test");
        self.created_customers.lock().unwrap().push((
            id.clone(),
            email.to_string(),
            user_id.to_string(),
        ));
        Ok(id)
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), StripeServiceError> {
        self.deleted_customers
            .lock()
            .unwrap()
            .push(customer_id.to_string());
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.checkout_requests.lock().unwrap().push(req);
        if *self.fail_create_session.lock().unwrap() {
            return Err(StripeServiceError::Api("mock session failure".into()));
        }
        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if *self.fail_verification.lock().unwrap() {
            return Err(StripeServiceError::Webhook("mock signature mismatch".into()));
        }
        let val: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let id = match val.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => make_id("evt"),
        };
        let ty = val
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let evt = StripeEvent {
            id,
            r#type: ty,
            payload: val,
        };
        self.events.lock().unwrap().push(evt.clone());
        Ok(evt)
    }

    async fn latest_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, StripeServiceError> {
        self.subscription_fetches
            .lock()
            .unwrap()
            .push(customer_id.to_string());
        if *self.fail_subscription_fetch.lock().unwrap() {
            return Err(StripeServiceError::Api("mock fetch failure".into()));
        }
        Ok(self.subscription.lock().unwrap().clone())
    }

    async fn set_subscription_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, StripeServiceError> {
        self.cancel_updates
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), cancel_at_period_end));

        let mut guard = self.subscription.lock().unwrap();
        let mut sub = guard.clone().ok_or_else(|| {
            StripeServiceError::NotFound(format!("subscription {} not found", subscription_id))
        })?;
        sub.cancel_at_period_end = cancel_at_period_end;
        *guard = Some(sub.clone());
        Ok(sub)
    }

    async fn list_products(&self) -> Result<Vec<ProductListing>, StripeServiceError> {
        Ok(self.products.lock().unwrap().clone())
    }
}
