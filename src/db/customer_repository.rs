use async_trait::async_trait;
use uuid::Uuid;

use crate::models::customer::CustomerMapping;

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Active (non-deleted) mapping for this user, if any.
    async fn find_mapping(&self, user_id: Uuid)
        -> Result<Option<CustomerMapping>, sqlx::Error>;

    /// Insert a mapping and return the row that actually owns the user. Under
    /// a concurrent first checkout both callers land here; the loser's insert
    /// is a no-op and the winner's row comes back, so the caller can tell its
    /// provider-side customer lost the race and clean it up.
    async fn insert_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<CustomerMapping, sqlx::Error>;

    /// Rollback path only: soft-delete the mapping created earlier in a failed
    /// multi-step checkout.
    async fn soft_delete_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error>;

    /// Reverse lookup used by webhook handlers to resolve the owning user.
    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error>;
}
