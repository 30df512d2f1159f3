use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Mapping from a local user to the Stripe customer created for them on first
/// checkout. At most one non-deleted row per user; rows are soft-deleted only
/// by the checkout rollback path.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CustomerMapping {
    pub user_id: Uuid,
    pub customer_id: String,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}
