use async_trait::async_trait;

use crate::models::order::Order;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), sqlx::Error>;
}
