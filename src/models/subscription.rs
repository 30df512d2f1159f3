use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Closed set of subscription lifecycle states. `NotStarted` is ours (row
/// created before any Stripe subscription exists); the rest mirror Stripe's
/// status strings verbatim. Unrecognized provider strings fail closed at the
/// parse site instead of being coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    NotStarted,
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::NotStarted => "not_started",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Active for product-access purposes. Trials count: the payment method is
    /// already collected and the subscription converts unless canceled.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SubscriptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "not_started" => SubscriptionStatus::NotStarted,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            other => return Err(UnknownStatus(other.to_string())),
        })
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known state of a customer's subscription, one row per Stripe customer.
/// Period and trial bounds are epoch seconds as Stripe reports them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    pub is_trial_used: bool,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
    pub updated_at: OffsetDateTime,
}

impl SubscriptionRecord {
    /// Fresh `not_started` row, written when a customer mapping is created in
    /// subscription mode and no Stripe subscription exists yet.
    pub fn not_started(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            subscription_id: None,
            price_id: None,
            status: SubscriptionStatus::NotStarted,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            trial_start: None,
            trial_end: None,
            is_trial_used: false,
            payment_method_brand: None,
            payment_method_last4: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
