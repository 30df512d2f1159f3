use async_trait::async_trait;
use uuid::Uuid;

use crate::models::trial_email::TrialEmailType;

/// Append-only ledger of trial lifecycle side effects. There is no
/// deduplication here; callers rely on their own invocation pattern for
/// idempotency.
#[async_trait]
pub trait TrialEmailStore: Send + Sync {
    async fn append(
        &self,
        user_id: Uuid,
        email_type: TrialEmailType,
        metadata: serde_json::Value,
    ) -> Result<(), sqlx::Error>;
}
