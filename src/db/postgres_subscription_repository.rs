use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::subscription_repository::SubscriptionStore;
use crate::models::subscription::{SubscriptionRecord, SubscriptionStatus};

pub struct PostgresSubscriptionStore {
    pub pool: PgPool,
}

fn record_from_row(row: PgRow) -> Result<SubscriptionRecord, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<SubscriptionStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(SubscriptionRecord {
        customer_id: row.try_get("customer_id")?,
        subscription_id: row.try_get("subscription_id")?,
        price_id: row.try_get("price_id")?,
        status,
        current_period_start: row.try_get("current_period_start")?,
        current_period_end: row.try_get("current_period_end")?,
        cancel_at_period_end: row.try_get("cancel_at_period_end")?,
        trial_start: row.try_get("trial_start")?,
        trial_end: row.try_get("trial_end")?,
        is_trial_used: row.try_get("is_trial_used")?,
        payment_method_brand: row.try_get("payment_method_brand")?,
        payment_method_last4: row.try_get("payment_method_last4")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const SELECT_COLUMNS: &str = "customer_id, subscription_id, price_id, status, \
     current_period_start, current_period_end, cancel_at_period_end, \
     trial_start, trial_end, is_trial_used, payment_method_brand, \
     payment_method_last4, updated_at";

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn get(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM stripe_subscriptions WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn insert_not_started_if_absent(&self, customer_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stripe_subscriptions (customer_id, status, cancel_at_period_end, is_trial_used)
            VALUES ($1, 'not_started', false, false)
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace(&self, record: &SubscriptionRecord) -> Result<(), sqlx::Error> {
        // Full-row replace except is_trial_used, which never goes back to
        // false once set.
        sqlx::query(
            r#"
            INSERT INTO stripe_subscriptions (
                customer_id, subscription_id, price_id, status,
                current_period_start, current_period_end, cancel_at_period_end,
                trial_start, trial_end, is_trial_used,
                payment_method_brand, payment_method_last4, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            ON CONFLICT (customer_id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                price_id = EXCLUDED.price_id,
                status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                trial_start = EXCLUDED.trial_start,
                trial_end = EXCLUDED.trial_end,
                is_trial_used = stripe_subscriptions.is_trial_used OR EXCLUDED.is_trial_used,
                payment_method_brand = EXCLUDED.payment_method_brand,
                payment_method_last4 = EXCLUDED.payment_method_last4,
                updated_at = now()
            "#,
        )
        .bind(&record.customer_id)
        .bind(&record.subscription_id)
        .bind(&record.price_id)
        .bind(record.status.as_str())
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.cancel_at_period_end)
        .bind(record.trial_start)
        .bind(record.trial_end)
        .bind(record.is_trial_used)
        .bind(&record.payment_method_brand)
        .bind(&record.payment_method_last4)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_cancel_at_period_end(
        &self,
        customer_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE stripe_subscriptions
            SET cancel_at_period_end = $2, updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .bind(cancel_at_period_end)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_user_used_trial(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        // No deleted_at filter: a trial consumed on a since-deleted mapping
        // still counts.
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM stripe_customers c
                JOIN stripe_subscriptions s ON s.customer_id = c.customer_id
                WHERE c.user_id = $1 AND s.is_trial_used
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn delete(&self, customer_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM stripe_subscriptions WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
