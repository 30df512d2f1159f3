use async_trait::async_trait;
use uuid::Uuid;

use crate::models::user::AuthUser;

/// Read-only view over the auth system's users table. Billing never writes
/// user rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<AuthUser>, sqlx::Error>;
}
