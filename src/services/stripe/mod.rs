// NOTE: async-stripe is compiled with a minimal feature set (runtime-tokio-hyper,
// checkout, billing, webhook-events, and connect to satisfy webhook payload
// types). Touching APIs outside those features requires updating Cargo.toml
// explicitly so we keep compile times and binary size in check.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StripeServiceError {
    #[error("stripe api error: {0}")]
    Api(String),
    #[error("webhook verification failed: {0}")]
    Webhook(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<stripe::StripeError> for StripeServiceError {
    fn from(err: stripe::StripeError) -> Self {
        StripeServiceError::Api(err.to_string())
    }
}

impl From<stripe::WebhookError> for StripeServiceError {
    fn from(err: stripe::WebhookError) -> Self {
        StripeServiceError::Webhook(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    /// Strict parse for request validation: anything but the two supported
    /// modes is a client error, not a serde fallback.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(CheckoutMode::Payment),
            "subscription" => Some(CheckoutMode::Subscription),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub mode: CheckoutMode,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    pub metadata: Option<std::collections::BTreeMap<String, String>>,
    /// Subscription mode only. None or zero means no trial.
    pub trial_period_days: Option<u32>,
    /// Collect a payment method even when the subscription starts in a trial.
    pub require_payment_method: bool,
    pub promotion_code: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Verified webhook event. The payload is kept as raw JSON and handlers read
/// only the fields they need; unrecognized shapes are ignored rather than
/// deserialized into the full upstream schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    pub r#type: String,
    pub payload: serde_json::Value,
}

/// The slice of a Stripe subscription the synchronizer consumes. Timestamps
/// are epoch seconds as Stripe reports them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceListing {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    /// Recurring interval ("month" / "year"); None for one-time prices.
    pub interval: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub images: Vec<String>,
    pub created: i64,
    pub updated: i64,
    pub prices: Vec<PriceListing>,
}

#[async_trait]
pub trait StripeService: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<String, StripeServiceError>;

    /// Compensation path for failed multi-step checkout creation.
    async fn delete_customer(&self, customer_id: &str) -> Result<(), StripeServiceError>;

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError>;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError>;

    /// Newest subscription for the customer (at most one is assumed to
    /// exist), with the default payment method expanded.
    async fn latest_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, StripeServiceError>;

    async fn set_subscription_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, StripeServiceError>;

    async fn list_products(&self) -> Result<Vec<ProductListing>, StripeServiceError>;
}

mod live;
mod mock;

pub use live::LiveStripeService;
pub use mock::MockStripeService;
