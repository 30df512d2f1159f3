use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The slice of the auth system's user row this service reads. User accounts
/// are owned by the authentication backend; billing only needs identity and
/// the email used to tag the Stripe customer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}
