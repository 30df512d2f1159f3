use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::billing::{sync::sync_customer_from_stripe, trial::handle_subscription_event};
use crate::models::order::Order;
use crate::responses::ErrorResponse;
use crate::services::stripe::StripeEvent;
use crate::state::AppState;

/// Webhook entry point. The provider retries on anything but a 2xx, so the
/// contract is: verify the signature, acknowledge immediately, process in the
/// background. Processing failures never change the acknowledgement.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get("stripe-signature").and_then(|v| v.to_str().ok()) else {
        return ErrorResponse::bad_request("Missing stripe-signature header").into_response();
    };

    let event = match state.stripe.verify_webhook(&body, signature) {
        Ok(event) => event,
        Err(err) => {
            error!(error = %err, "webhook signature verification failed");
            return ErrorResponse::bad_request("Invalid signature").into_response();
        }
    };

    info!(event_id = %event.id, event_type = %event.r#type, "webhook event accepted");
    tokio::spawn(process_event(state, event));

    Json(json!({ "received": true })).into_response()
}

/// Background continuation after the acknowledgement has been sent. Errors
/// here are logged only; the provider's redelivery is the retry mechanism.
pub async fn process_event(state: AppState, event: StripeEvent) {
    let object = &event.payload["data"]["object"];
    let Some(customer_id) = object["customer"].as_str().map(str::to_string) else {
        info!(event_type = %event.r#type, "event without customer, ignoring");
        return;
    };

    match event.r#type.as_str() {
        "payment_intent.succeeded" => {
            // One-time payment artifact: the order was already recorded via
            // checkout.session.completed.
            if object["invoice"].as_str().is_none() {
                info!(event_id = %event.id, "payment_intent without invoice, ignoring");
                return;
            }
            run_sync(&state, &customer_id, &event).await;
        }
        "checkout.session.completed" => match object["mode"].as_str() {
            Some("subscription") => run_sync(&state, &customer_id, &event).await,
            Some("payment") if object["payment_status"].as_str() == Some("paid") => {
                record_order(&state, &customer_id, &event).await;
            }
            other => {
                info!(event_id = %event.id, mode = ?other, "checkout session not actionable");
            }
        },
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_event(&state, &event.r#type, &event.payload).await;
            run_sync(&state, &customer_id, &event).await;
        }
        _ => run_sync(&state, &customer_id, &event).await,
    }
}

async fn run_sync(state: &AppState, customer_id: &str, event: &StripeEvent) {
    if let Err(err) = sync_customer_from_stripe(state, customer_id).await {
        error!(
            event_id = %event.id,
            event_type = %event.r#type,
            customer_id,
            error = %err,
            "subscription synchronization failed"
        );
    }
}

async fn record_order(state: &AppState, customer_id: &str, event: &StripeEvent) {
    let object = &event.payload["data"]["object"];
    let Some(session_id) = object["id"].as_str() else {
        error!(event_id = %event.id, "checkout session payload missing id");
        return;
    };

    let order = Order {
        checkout_session_id: session_id.to_string(),
        payment_intent_id: object["payment_intent"].as_str().map(str::to_string),
        customer_id: customer_id.to_string(),
        amount_subtotal: object["amount_subtotal"].as_i64(),
        amount_total: object["amount_total"].as_i64(),
        currency: object["currency"].as_str().map(str::to_string),
        payment_status: "paid".to_string(),
        status: "completed".to_string(),
        created_at: OffsetDateTime::now_utc(),
    };

    if let Err(err) = state.orders.insert_order(&order).await {
        error!(event_id = %event.id, customer_id, error = %err, "order insert failed");
    } else {
        info!(event_id = %event.id, customer_id, session_id, "one-time payment order recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::models::subscription::SubscriptionStatus;
    use crate::services::notifier::MockNotifier;
    use crate::services::stripe::{MockStripeService, SubscriptionSnapshot};
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;

    fn signed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", "t=1,v1=sig".parse().unwrap());
        headers
    }

    fn snapshot(status: &str) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            id: "sub_1".into(),
            status: status.into(),
            price_id: Some("price_month".into()),
            current_period_start: 1_700_000_000,
            current_period_end: 1_702_592_000,
            cancel_at_period_end: false,
            trial_start: None,
            trial_end: None,
            payment_method_brand: None,
            payment_method_last4: None,
        }
    }

    /// Polls until the spawned continuation produces the expected state.
    async fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !cond() {
            if tokio::time::Instant::now() > deadline {
                panic!("background processing did not settle before deadline");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// For asserting the absence of effects: gives any (incorrectly) spawned
    /// work a window to run. Can only hide a failure, never cause one.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn missing_signature_header_is_bad_request() {
        let stripe = MockStripeService::new();
        let state = test_state(Arc::new(MockDb::default()), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(r#"{"id":"evt_1","type":"customer.subscription.updated"}"#);
        let resp = stripe_webhook(State(state), HeaderMap::new(), body).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(stripe.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_without_downstream_effects() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new();
        *stripe.fail_verification.lock().unwrap() = true;
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"customer.subscription.updated","data":{"object":{"customer":"cus_1"}}}"#,
        );
        let resp = stripe_webhook(State(state), signed_headers(), body).await;
        settle().await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(stripe.subscription_fetches.lock().unwrap().is_empty());
        assert!(db.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_event_acks_with_received_true() {
        let stripe = MockStripeService::new().with_subscription(snapshot("active"));
        let state = test_state(Arc::new(MockDb::default()), stripe, MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{"customer":"cus_1"}}}"#,
        );
        let resp = stripe_webhook(State(state), signed_headers(), body).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, json!({ "received": true }));
    }

    #[tokio::test]
    async fn ack_does_not_wait_for_processing_outcome() {
        // Downstream sync fails, the acknowledgement is still 200.
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new();
        *stripe.fail_subscription_fetch.lock().unwrap() = true;
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"customer.subscription.updated","data":{"object":{"customer":"cus_1"}}}"#,
        );
        let resp = stripe_webhook(State(state), signed_headers(), body).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // The continuation did attempt the fetch, and the failed sync wrote
        // nothing.
        wait_for(|| !stripe.subscription_fetches.lock().unwrap().is_empty()).await;
        assert!(db.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_event_triggers_sync_with_provider_state() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new().with_subscription(snapshot("active"));
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        // Payload claims trialing; the stored row must reflect the provider.
        let body = Bytes::from(
            r#"{"id":"evt_1","type":"customer.subscription.updated","data":{"object":{"customer":"cus_1","status":"trialing"}}}"#,
        );
        let resp = stripe_webhook(State(state), signed_headers(), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        wait_for(|| db.subscriptions.lock().unwrap().contains_key("cus_1")).await;

        assert_eq!(*stripe.subscription_fetches.lock().unwrap(), vec!["cus_1"]);
        let stored = db.subscriptions.lock().unwrap().get("cus_1").cloned().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn event_without_customer_is_ignored() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new();
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"product.updated","data":{"object":{"id":"prod_1"}}}"#,
        );
        let resp = stripe_webhook(State(state), signed_headers(), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        settle().await;

        assert!(stripe.subscription_fetches.lock().unwrap().is_empty());
        assert!(db.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn payment_intent_without_invoice_is_ignored() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new().with_subscription(snapshot("active"));
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"customer":"cus_1","invoice":null}}}"#,
        );
        stripe_webhook(State(state), signed_headers(), body).await;
        settle().await;

        assert!(stripe.subscription_fetches.lock().unwrap().is_empty());
        assert!(db.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn paid_payment_session_records_order() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new();
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{
                "id":"cs_1","customer":"cus_1","mode":"payment","payment_status":"paid",
                "payment_intent":"pi_1","amount_subtotal":1900,"amount_total":1900,"currency":"eur"
            }}}"#,
        );
        stripe_webhook(State(state), signed_headers(), body).await;
        wait_for(|| !db.orders.lock().unwrap().is_empty()).await;

        let orders = db.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].checkout_session_id, "cs_1");
        assert_eq!(orders[0].payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(orders[0].amount_total, Some(1900));
        // No provider fetch for one-time payments: the session is authoritative.
        assert!(stripe.subscription_fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_session_completed_triggers_sync() {
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new().with_subscription(snapshot("trialing"));
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let body = Bytes::from(
            r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{
                "id":"cs_1","customer":"cus_1","mode":"subscription","payment_status":"paid"
            }}}"#,
        );
        stripe_webhook(State(state), signed_headers(), body).await;
        wait_for(|| !stripe.subscription_fetches.lock().unwrap().is_empty()).await;

        assert_eq!(*stripe.subscription_fetches.lock().unwrap(), vec!["cus_1"]);
        assert!(db.orders.lock().unwrap().is_empty());
    }
}
