use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One-time payment recorded straight from a completed checkout session. For
/// payment-mode checkouts the session payload is authoritative; there is no
/// separate provider fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: String,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}
