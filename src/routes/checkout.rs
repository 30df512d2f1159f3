use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::billing::compensation::CompensationList;
use crate::models::customer::CustomerMapping;
use crate::models::trial_email::TrialEmailType;
use crate::models::user::AuthUser;
use crate::responses::ErrorResponse;
use crate::routes::auth::authenticate;
use crate::services::stripe::{CheckoutLineItem, CheckoutMode, CreateCheckoutSessionRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub mode: Option<String>,
    pub trial_period_days: Option<u32>,
    /// Accepted for client compatibility; session construction does not use it.
    pub billing_cycle_anchor: Option<i64>,
    pub promotion_code: Option<String>,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Response {
    let Some(price_id) = req.price_id.filter(|s| !s.is_empty()) else {
        return ErrorResponse::bad_request("Missing price_id").into_response();
    };
    let Some(success_url) = req.success_url.filter(|s| !s.is_empty()) else {
        return ErrorResponse::bad_request("Missing success_url").into_response();
    };
    let Some(cancel_url) = req.cancel_url.filter(|s| !s.is_empty()) else {
        return ErrorResponse::bad_request("Missing cancel_url").into_response();
    };
    let Some(mode_raw) = req.mode.filter(|s| !s.is_empty()) else {
        return ErrorResponse::bad_request("Missing mode").into_response();
    };
    let Some(mode) = CheckoutMode::parse(&mode_raw) else {
        return ErrorResponse::bad_request("Invalid mode").into_response();
    };

    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut trial_days = req.trial_period_days.unwrap_or(0);
    if mode == CheckoutMode::Subscription && trial_days > 0 {
        // Trial usage is checked across every customer the user has ever had,
        // including soft-deleted mappings, so cancel/resubscribe cycles cannot
        // mint a second free trial.
        match state.subscriptions.has_user_used_trial(user.id).await {
            Ok(true) => {
                info!(user_id = %user.id, "trial already consumed, forcing trial to zero");
                trial_days = 0;
            }
            Ok(false) => {}
            Err(err) => {
                error!(user_id = %user.id, error = %err, "trial eligibility lookup failed");
                return ErrorResponse::server_error("Internal error").into_response();
            }
        }
    }

    let (mapping, compensation) = match ensure_customer(&state, &user, mode).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let trial = (mode == CheckoutMode::Subscription && trial_days > 0).then_some(trial_days);
    let session_req = CreateCheckoutSessionRequest {
        success_url,
        cancel_url,
        mode,
        line_items: vec![CheckoutLineItem {
            price: price_id.clone(),
            quantity: 1,
        }],
        customer: Some(mapping.customer_id.clone()),
        client_reference_id: Some(user.id.to_string()),
        metadata: Some(
            [("user_id".to_string(), user.id.to_string())]
                .into_iter()
                .collect(),
        ),
        trial_period_days: trial,
        require_payment_method: mode == CheckoutMode::Subscription,
        promotion_code: req.promotion_code,
    };

    let session = match state.stripe.create_checkout_session(session_req).await {
        Ok(session) => session,
        Err(err) => {
            error!(user_id = %user.id, error = %err, "checkout session creation failed");
            compensation.run().await;
            return ErrorResponse::server_error("Failed to create checkout session")
                .into_response();
        }
    };

    if trial.is_some() {
        let metadata = json!({
            "price_id": price_id,
            "checkout_session_id": session.id,
            "trial_period_days": trial,
        });
        if let Err(err) = state
            .trial_emails
            .append(user.id, TrialEmailType::TrialCheckoutAttempted, metadata)
            .await
        {
            warn!(user_id = %user.id, error = %err, "trial attempt audit row failed");
        }
    }

    Json(json!({ "sessionId": session.id, "url": session.url })).into_response()
}

/// Resolves (or provisions) the billing customer for the user. Returns the
/// mapping plus the undo stack for everything provisioned along the way, so
/// the caller can roll back if session creation fails afterwards.
async fn ensure_customer(
    state: &AppState,
    user: &AuthUser,
    mode: CheckoutMode,
) -> Result<(CustomerMapping, CompensationList), Response> {
    let existing = state.customers.find_mapping(user.id).await.map_err(|err| {
        error!(user_id = %user.id, error = %err, "customer mapping lookup failed");
        ErrorResponse::server_error("Internal error").into_response()
    })?;

    if let Some(mapping) = existing {
        // Self-heal: an existing mapping without a subscription row means an
        // earlier provisioning attempt died halfway.
        if mode == CheckoutMode::Subscription {
            ensure_subscription_row(state, &mapping.customer_id).await?;
        }
        return Ok((mapping, CompensationList::new()));
    }

    let customer_id = state
        .stripe
        .create_customer(&user.email, &user.id.to_string())
        .await
        .map_err(|err| {
            error!(user_id = %user.id, error = %err, "billing customer creation failed");
            ErrorResponse::server_error("Failed to create billing customer").into_response()
        })?;

    let mut compensation = CompensationList::new();
    {
        let stripe = state.stripe.clone();
        let cid = customer_id.clone();
        compensation.push("delete billing customer", move || async move {
            stripe.delete_customer(&cid).await.map_err(|e| e.to_string())
        });
    }

    let mapping = match state.customers.insert_mapping(user.id, &customer_id).await {
        Ok(mapping) => mapping,
        Err(err) => {
            error!(user_id = %user.id, error = %err, "customer mapping insert failed");
            compensation.run().await;
            return Err(ErrorResponse::server_error("Internal error").into_response());
        }
    };

    if mapping.customer_id != customer_id {
        // Lost the insert race: a concurrent request already mapped this user.
        // Drop the orphan customer we just created and continue with theirs.
        warn!(user_id = %user.id, "concurrent checkout mapped user first, discarding orphan customer");
        compensation.run().await;
        if mode == CheckoutMode::Subscription {
            ensure_subscription_row(state, &mapping.customer_id).await?;
        }
        // Nothing left to undo: everything from here on was created by the
        // winning request.
        return Ok((mapping, CompensationList::new()));
    }

    {
        let customers = state.customers.clone();
        let user_id = user.id;
        let cid = customer_id.clone();
        compensation.push("soft-delete customer mapping", move || async move {
            customers
                .soft_delete_mapping(user_id, &cid)
                .await
                .map_err(|e| e.to_string())
        });
    }

    if mode == CheckoutMode::Subscription {
        if let Err(err) = state
            .subscriptions
            .insert_not_started_if_absent(&customer_id)
            .await
        {
            error!(user_id = %user.id, error = %err, "subscription row insert failed");
            compensation.run().await;
            return Err(ErrorResponse::server_error("Internal error").into_response());
        }
        let subscriptions = state.subscriptions.clone();
        let cid = customer_id.clone();
        compensation.push("delete subscription row", move || async move {
            subscriptions.delete(&cid).await.map_err(|e| e.to_string())
        });
    }

    Ok((mapping, compensation))
}

async fn ensure_subscription_row(state: &AppState, customer_id: &str) -> Result<(), Response> {
    state
        .subscriptions
        .insert_not_started_if_absent(customer_id)
        .await
        .map_err(|err| {
            error!(customer_id, error = %err, "subscription row insert failed");
            ErrorResponse::server_error("Internal error").into_response()
        })
}
