use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::order_repository::OrderStore;
use crate::models::order::Order;

pub struct PostgresOrderStore {
    pub pool: PgPool,
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), sqlx::Error> {
        // Checkout session ids are unique, so webhook redelivery is a no-op.
        sqlx::query(
            r#"
            INSERT INTO stripe_orders (
                checkout_session_id, payment_intent_id, customer_id,
                amount_subtotal, amount_total, currency, payment_status, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (checkout_session_id) DO NOTHING
            "#,
        )
        .bind(&order.checkout_session_id)
        .bind(&order.payment_intent_id)
        .bind(&order.customer_id)
        .bind(order.amount_subtotal)
        .bind(order.amount_total)
        .bind(&order.currency)
        .bind(&order.payment_status)
        .bind(&order.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
