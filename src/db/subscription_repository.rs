use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::SubscriptionRecord;

/// Store for the last-known subscription state, one row per Stripe customer.
///
/// `replace` is a full-row upsert keyed on `customer_id`: every column is
/// overwritten with the synchronizer's view of the provider, including trial
/// bounds (nulled when the provider reports none). The single exception is
/// `is_trial_used`, which is monotonic: once true it stays true across
/// replaces, and only webhook-driven sync ever raises it.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>, sqlx::Error>;

    /// Seed a `not_started` row if none exists. Used at mapping creation and
    /// by the checkout path's self-healing step; never downgrades an existing
    /// row.
    async fn insert_not_started_if_absent(&self, customer_id: &str) -> Result<(), sqlx::Error>;

    async fn replace(&self, record: &SubscriptionRecord) -> Result<(), sqlx::Error>;

    async fn set_cancel_at_period_end(
        &self,
        customer_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<(), sqlx::Error>;

    /// Whether this user has ever consumed a trial, across all mappings
    /// including soft-deleted ones. This is the guard against repeated free
    /// trials over cancel/resubscribe cycles, so it deliberately ignores
    /// `deleted_at`.
    async fn has_user_used_trial(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Rollback path only: remove the row seeded during a failed checkout.
    async fn delete(&self, customer_id: &str) -> Result<(), sqlx::Error>;
}
