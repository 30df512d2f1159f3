use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::customer_repository::CustomerStore;
use crate::models::customer::CustomerMapping;

pub struct PostgresCustomerStore {
    pub pool: PgPool,
}

#[async_trait]
impl CustomerStore for PostgresCustomerStore {
    async fn find_mapping(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CustomerMapping>, sqlx::Error> {
        sqlx::query_as::<_, CustomerMapping>(
            r#"
            SELECT user_id, customer_id, created_at, deleted_at
            FROM stripe_customers
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<CustomerMapping, sqlx::Error> {
        // The partial unique index on (user_id) WHERE deleted_at IS NULL makes
        // this safe under concurrent first checkouts: the loser's insert is a
        // no-op and the re-read below returns the winning row.
        sqlx::query(
            r#"
            INSERT INTO stripe_customers (user_id, customer_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) WHERE deleted_at IS NULL DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, CustomerMapping>(
            r#"
            SELECT user_id, customer_id, created_at, deleted_at
            FROM stripe_customers
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn soft_delete_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE stripe_customers
            SET deleted_at = now()
            WHERE user_id = $1 AND customer_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM stripe_customers
            WHERE customer_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }
}
