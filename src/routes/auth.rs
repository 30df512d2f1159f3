use axum::{
    http::header::AUTHORIZATION,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::models::user::AuthUser;
use crate::responses::ErrorResponse;
use crate::state::AppState;
use crate::utils::jwt::decode_jwt;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a UUID string.
    pub id: String,
    pub email: String,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Resolves the bearer token in `headers` to a live user row. Every billing
/// endpoint goes through this before touching Stripe or the database.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, Response> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ErrorResponse::unauthorized("Missing bearer token").into_response())?;

    let data = decode_jwt(
        token,
        &state.jwt_keys,
        &state.config.jwt_issuer,
        &state.config.jwt_audience,
    )
    .map_err(|_| ErrorResponse::unauthorized("Invalid token").into_response())?;

    let user_id = Uuid::parse_str(&data.claims.id)
        .map_err(|_| ErrorResponse::unauthorized("Invalid token").into_response())?;

    match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ErrorResponse::not_found("User not found").into_response()),
        Err(err) => {
            error!(%user_id, error = %err, "user lookup failed during authentication");
            Err(ErrorResponse::server_error("Internal error").into_response())
        }
    }
}
