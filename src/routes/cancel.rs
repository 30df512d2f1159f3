use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::responses::ErrorResponse;
use crate::routes::auth::authenticate;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub cancel_immediately: Option<bool>,
}

/// Schedules the caller's subscription to cancel at period end. The
/// `cancel_immediately` flag is accepted for client compatibility but the
/// implemented path always schedules end-of-period cancellation.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CancelRequest>>,
) -> Response {
    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let req = body.map(|Json(r)| r).unwrap_or_default();
    if req.cancel_immediately == Some(true) {
        warn!(user_id = %user.id, "immediate cancellation requested, scheduling at period end instead");
    }

    let mapping = match state.customers.find_mapping(user.id).await {
        Ok(Some(mapping)) => mapping,
        Ok(None) => {
            return ErrorResponse::not_found("No billing customer for user").into_response();
        }
        Err(err) => {
            error!(user_id = %user.id, error = %err, "customer mapping lookup failed");
            return ErrorResponse::server_error("Internal error").into_response();
        }
    };

    let subscription_id = match state.subscriptions.get(&mapping.customer_id).await {
        Ok(Some(record)) => match record.subscription_id {
            Some(id) => id,
            None => {
                return ErrorResponse::not_found("No active subscription").into_response();
            }
        },
        Ok(None) => {
            return ErrorResponse::not_found("No active subscription").into_response();
        }
        Err(err) => {
            error!(user_id = %user.id, error = %err, "subscription lookup failed");
            return ErrorResponse::server_error("Internal error").into_response();
        }
    };

    if let Err(err) = state
        .stripe
        .set_subscription_cancel_at_period_end(&subscription_id, true)
        .await
    {
        error!(user_id = %user.id, subscription_id, error = %err, "provider cancellation failed");
        return ErrorResponse::server_error("Failed to cancel subscription").into_response();
    }

    if let Err(err) = state
        .subscriptions
        .set_cancel_at_period_end(&mapping.customer_id, true)
        .await
    {
        // Provider state is already updated; the next webhook sync repairs
        // the local row.
        error!(user_id = %user.id, error = %err, "local cancellation flag update failed");
    }

    info!(user_id = %user.id, subscription_id, "subscription scheduled for cancellation");
    Json(json!({
        "success": true,
        "message": "Your subscription will be canceled at the end of the current billing period."
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::models::subscription::{SubscriptionRecord, SubscriptionStatus};
    use crate::models::user::AuthUser;
    use crate::routes::auth::test_support::bearer_headers_for;
    use crate::services::notifier::MockNotifier;
    use crate::services::stripe::{MockStripeService, SubscriptionSnapshot};
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
        }
    }

    fn active_record(customer_id: &str) -> SubscriptionRecord {
        let mut record = SubscriptionRecord::not_started(customer_id);
        record.subscription_id = Some("sub_1".into());
        record.status = SubscriptionStatus::Active;
        record
    }

    fn provider_snapshot() -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            id: "sub_1".into(),
            status: "active".into(),
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

    #[tokio::test]
    async fn missing_mapping_is_not_found() {
        let user = test_user();
        let state = test_state(
            Arc::new(MockDb::default().with_user(user.clone())),
            MockStripeService::new(),
            MockNotifier::default(),
        );
        let resp = cancel_subscription(State(state), bearer_headers_for(&user), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn not_started_subscription_is_not_found() {
        let user = test_user();
        let db = Arc::new(MockDb::default().with_user(user.clone()));
        db.seed_mapping(user.id, "cus_1");
        db.seed_subscription(SubscriptionRecord::not_started("cus_1"));
        let state = test_state(db, MockStripeService::new(), MockNotifier::default());

        let resp = cancel_subscription(State(state), bearer_headers_for(&user), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_schedules_at_period_end_and_updates_local_flag() {
        let user = test_user();
        let db = Arc::new(MockDb::default().with_user(user.clone()));
        db.seed_mapping(user.id, "cus_1");
        db.seed_subscription(active_record("cus_1"));
        let stripe = MockStripeService::new().with_subscription(provider_snapshot());
        let state = test_state(db.clone(), stripe.clone(), MockNotifier::default());

        let resp = cancel_subscription(State(state), bearer_headers_for(&user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let updates = stripe.cancel_updates.lock().unwrap();
        assert_eq!(*updates, vec![("sub_1".to_string(), true)]);

        let record = db.subscriptions.lock().unwrap().get("cus_1").cloned().unwrap();
        assert!(record.cancel_at_period_end);
    }

    #[tokio::test]
    async fn cancel_immediately_still_schedules_at_period_end() {
        let user = test_user();
        let db = Arc::new(MockDb::default().with_user(user.clone()));
        db.seed_mapping(user.id, "cus_1");
        db.seed_subscription(active_record("cus_1"));
        let stripe = MockStripeService::new().with_subscription(provider_snapshot());
        let state = test_state(db, stripe.clone(), MockNotifier::default());

        let resp = cancel_subscription(
            State(state),
            bearer_headers_for(&user),
            Some(Json(CancelRequest {
                cancel_immediately: Some(true),
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // The provider call is always a period-end schedule, never a delete.
        let updates = stripe.cancel_updates.lock().unwrap();
        assert_eq!(*updates, vec![("sub_1".to_string(), true)]);
    }
}
