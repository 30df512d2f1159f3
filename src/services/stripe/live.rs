use async_trait::async_trait;

use super::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CreateCheckoutSessionRequest, PriceListing,
    ProductListing, StripeEvent, StripeService, StripeServiceError, SubscriptionSnapshot,
};

pub struct LiveStripeService {
    client: stripe::Client,
    webhook_secret: String,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone(), settings.webhook_secret.clone())
    }
}

fn map_mode(mode: CheckoutMode) -> stripe::CheckoutSessionMode {
    match mode {
        CheckoutMode::Payment => stripe::CheckoutSessionMode::Payment,
        CheckoutMode::Subscription => stripe::CheckoutSessionMode::Subscription,
    }
}

fn map_line_items(items: &[CheckoutLineItem]) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price: Some(li.price.clone()),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

fn snapshot_from_subscription(sub: stripe::Subscription) -> SubscriptionSnapshot {
    let price_id = sub
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())
        .map(|price| price.id.to_string());

    let (payment_method_brand, payment_method_last4) = match sub.default_payment_method.as_ref() {
        Some(stripe::Expandable::Object(pm)) => match pm.card.as_ref() {
            Some(card) => (Some(card.brand.to_string()), Some(card.last4.to_string())),
            None => (None, None),
        },
        _ => (None, None),
    };

    SubscriptionSnapshot {
        id: sub.id.to_string(),
        status: sub.status.to_string(),
        price_id,
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
        trial_start: sub.trial_start,
        trial_end: sub.trial_end,
        payment_method_brand,
        payment_method_last4,
    }
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<String, StripeServiceError> {
        let mut params = stripe::CreateCustomer::new();
        params.email = Some(email);
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        params.metadata = Some(metadata);

        let customer = stripe::Customer::create(&self.client, params).await?;
        Ok(customer.id.to_string())
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), StripeServiceError> {
        let cid = customer_id
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        stripe::Customer::delete(&self.client, &cid).await?;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(map_mode(req.mode));
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        if let Some(ref customer) = req.customer {
            let cid = customer
                .parse::<stripe::CustomerId>()
                .map_err(|e| StripeServiceError::Other(e.to_string()))?;
            params.customer = Some(cid);
        }
        if let Some(ref meta) = req.metadata {
            let mut m = std::collections::HashMap::new();
            for (k, v) in meta.iter() {
                m.insert(k.clone(), v.clone());
            }
            params.metadata = Some(m);
        }
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items));
        }

        if req.mode == CheckoutMode::Subscription {
            // Zero-day trials are omitted entirely; Stripe rejects them.
            if let Some(days) = req.trial_period_days.filter(|d| *d > 0) {
                params.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
                    trial_period_days: Some(days),
                    ..Default::default()
                });
            }
            if req.require_payment_method {
                params.payment_method_collection =
                    Some(stripe::CheckoutSessionPaymentMethodCollection::Always);
            }
        }
        if let Some(code) = req.promotion_code.clone() {
            params.discounts = Some(vec![stripe::CreateCheckoutSessionDiscounts {
                promotion_code: Some(code),
                ..Default::default()
            }]);
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let payload_str =
            std::str::from_utf8(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let event =
            stripe::Webhook::construct_event(payload_str, signature_header, &self.webhook_secret)?;
        let payload =
            serde_json::to_value(&event).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        Ok(StripeEvent {
            id: event.id.to_string(),
            r#type: event.type_.to_string(),
            payload,
        })
    }

    async fn latest_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, StripeServiceError> {
        let cust_id = customer_id
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;

        let mut list_params = stripe::ListSubscriptions::new();
        list_params.customer = Some(cust_id);
        // Newest first is Stripe's default ordering; one row is all we keep.
        list_params.limit = Some(1);
        list_params.expand = &["data.default_payment_method"];

        let subs = stripe::Subscription::list(&self.client, &list_params).await?;
        Ok(subs.data.into_iter().next().map(snapshot_from_subscription))
    }

    async fn set_subscription_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, StripeServiceError> {
        let sub_id = subscription_id
            .parse::<stripe::SubscriptionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let mut params = stripe::UpdateSubscription::new();
        params.cancel_at_period_end = Some(cancel_at_period_end);
        let sub = stripe::Subscription::update(&self.client, &sub_id, params).await?;
        Ok(snapshot_from_subscription(sub))
    }

    async fn list_products(&self) -> Result<Vec<ProductListing>, StripeServiceError> {
        let mut list_params = stripe::ListProducts::new();
        list_params.active = Some(true);
        let products = stripe::Product::list(&self.client, &list_params).await?;

        let mut listings = Vec::with_capacity(products.data.len());
        for product in products.data {
            let mut price_params = stripe::ListPrices::new();
            price_params.active = Some(true);
            price_params.product = Some(stripe::IdOrCreate::Id(&product.id));
            let prices = stripe::Price::list(&self.client, &price_params).await?;

            let prices = prices
                .data
                .into_iter()
                .map(|price| PriceListing {
                    id: price.id.to_string(),
                    unit_amount: price.unit_amount,
                    currency: price.currency.map(|c| c.to_string()),
                    interval: price.recurring.as_ref().map(|r| r.interval.to_string()),
                })
                .collect();

            listings.push(ProductListing {
                id: product.id.to_string(),
                name: product.name.clone().unwrap_or_default(),
                description: product.description.clone(),
                metadata: product
                    .metadata
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
                images: product.images.clone().unwrap_or_default(),
                created: product.created.unwrap_or_default(),
                updated: product.updated.unwrap_or_default(),
                prices,
            });
        }

        Ok(listings)
    }
}
