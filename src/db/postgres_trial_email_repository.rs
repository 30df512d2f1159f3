use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::trial_email_repository::TrialEmailStore;
use crate::models::trial_email::TrialEmailType;

pub struct PostgresTrialEmailStore {
    pub pool: PgPool,
}

#[async_trait]
impl TrialEmailStore for PostgresTrialEmailStore {
    async fn append(
        &self,
        user_id: Uuid,
        email_type: TrialEmailType,
        metadata: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trial_email_log (user_id, email_type, metadata)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(email_type.as_str())
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
