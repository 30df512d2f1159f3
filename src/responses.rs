use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Error envelope returned to API callers. Internal detail stays in the logs;
/// the message here is all a client ever sees.
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    fn with_status(status: StatusCode, msg: &str) -> impl IntoResponse {
        (
            status,
            Json(ErrorResponse {
                error: msg.to_string(),
            }),
        )
    }

    pub fn bad_request(msg: &str) -> impl IntoResponse {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> impl IntoResponse {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: &str) -> impl IntoResponse {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn too_many_requests(msg: &str) -> impl IntoResponse {
        Self::with_status(StatusCode::TOO_MANY_REQUESTS, msg)
    }

    pub fn server_error(msg: &str) -> impl IntoResponse {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::from_slice;

    #[tokio::test]
    async fn error_response_uses_error_envelope() {
        let resp = ErrorResponse::bad_request("Missing price_id").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: ErrorResponse = from_slice(&body).unwrap();
        assert_eq!(json.error, "Missing price_id");
    }

    #[tokio::test]
    async fn server_error_is_500() {
        let resp = ErrorResponse::server_error("Internal error").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
