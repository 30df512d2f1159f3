use time::OffsetDateTime;
use tracing::{info, warn};

use crate::models::subscription::{SubscriptionRecord, SubscriptionStatus};
use crate::services::stripe::{StripeServiceError, SubscriptionSnapshot};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("stripe error: {0}")]
    Stripe(#[from] StripeServiceError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown subscription status: {0}")]
    UnknownStatus(String),
}

/// Reconciles the local subscription row with what Stripe currently reports
/// for the customer. Webhook payloads are treated as a hint only: the
/// authoritative state is always re-fetched here, so stale or out-of-order
/// deliveries converge on the provider's truth.
pub async fn sync_customer_from_stripe(
    state: &AppState,
    customer_id: &str,
) -> Result<(), SyncError> {
    let snapshot = state
        .stripe
        .latest_subscription_for_customer(customer_id)
        .await?;

    let record = match snapshot {
        None => {
            info!(customer_id, "no subscription at provider, storing not_started");
            SubscriptionRecord::not_started(customer_id)
        }
        Some(snap) => record_from_snapshot(customer_id, &snap)?,
    };

    state.subscriptions.replace(&record).await?;
    info!(
        customer_id,
        status = %record.status,
        "subscription state synchronized"
    );
    Ok(())
}

fn record_from_snapshot(
    customer_id: &str,
    snap: &SubscriptionSnapshot,
) -> Result<SubscriptionRecord, SyncError> {
    // Unknown statuses fail closed: better to keep the last known row than to
    // guess at entitlement.
    let status: SubscriptionStatus = snap.status.parse().map_err(|_| {
        warn!(customer_id, status = %snap.status, "unrecognized subscription status");
        SyncError::UnknownStatus(snap.status.clone())
    })?;

    Ok(SubscriptionRecord {
        customer_id: customer_id.to_string(),
        subscription_id: Some(snap.id.clone()),
        price_id: snap.price_id.clone(),
        status,
        current_period_start: Some(snap.current_period_start),
        current_period_end: Some(snap.current_period_end),
        cancel_at_period_end: snap.cancel_at_period_end,
        trial_start: snap.trial_start,
        trial_end: snap.trial_end,
        // Monotonic in the store: once a customer has consumed a trial the
        // flag never clears, even if later snapshots carry no trial bounds.
        is_trial_used: snap.trial_start.is_some() || status == SubscriptionStatus::Trialing,
        payment_method_brand: snap.payment_method_brand.clone(),
        payment_method_last4: snap.payment_method_last4.clone(),
        updated_at: OffsetDateTime::now_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::db::subscription_repository::SubscriptionStore;
    use crate::services::notifier::MockNotifier;
    use crate::services::stripe::MockStripeService;
    use crate::state::test_support::test_state;
    use std::sync::Arc;

    fn snapshot(status: &str) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            id: "sub_1".into(),
            status: status.into(),
            price_id: Some("price_month".into()),
            current_period_start: 1_700_000_000,
            current_period_end: 1_702_592_000,
            cancel_at_period_end: false,
            trial_start: None,
            trial_end: None,
            payment_method_brand: Some("visa".into()),
            payment_method_last4: Some("4242".into()),
        }
    }

    #[tokio::test]
    async fn stores_provider_state_not_payload_state() {
        // A stale webhook may claim `trialing`; the synchronizer ignores the
        // claim and writes whatever the provider reports right now.
        let db = Arc::new(MockDb::default());
        let stripe = MockStripeService::new().with_subscription(snapshot("active"));
        let state = test_state(db.clone(), stripe, MockNotifier::default());

        sync_customer_from_stripe(&state, "cus_1").await.unwrap();

        let stored = db.get("cus_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(stored.payment_method_last4.as_deref(), Some("4242"));
    }

    #[tokio::test]
    async fn no_provider_subscription_stores_not_started() {
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone(), MockStripeService::new(), MockNotifier::default());

        sync_customer_from_stripe(&state, "cus_1").await.unwrap();

        let stored = db.get("cus_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::NotStarted);
        assert!(stored.subscription_id.is_none());
    }

    #[tokio::test]
    async fn trial_usage_survives_snapshot_without_trial_bounds() {
        let db = Arc::new(MockDb::default());
        let mut seeded = SubscriptionRecord::not_started("cus_1");
        seeded.status = SubscriptionStatus::Trialing;
        seeded.is_trial_used = true;
        seeded.trial_start = Some(1_699_000_000);
        seeded.trial_end = Some(1_700_209_600);
        db.seed_subscription(seeded);

        let stripe = MockStripeService::new().with_subscription(snapshot("active"));
        let state = test_state(db.clone(), stripe, MockNotifier::default());

        sync_customer_from_stripe(&state, "cus_1").await.unwrap();

        let stored = db.get("cus_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert!(stored.is_trial_used, "trial consumption must never reset");
        // Full-row replace: bounds the provider no longer reports are nulled,
        // only the usage flag is monotonic.
        assert_eq!(stored.trial_start, None);
        assert_eq!(stored.trial_end, None);
    }

    #[tokio::test]
    async fn trialing_snapshot_marks_trial_used_and_keeps_bounds() {
        let db = Arc::new(MockDb::default());
        let mut snap = snapshot("trialing");
        snap.trial_start = Some(1_700_000_000);
        snap.trial_end = Some(1_701_209_600);
        let stripe = MockStripeService::new().with_subscription(snap);
        let state = test_state(db.clone(), stripe, MockNotifier::default());

        sync_customer_from_stripe(&state, "cus_1").await.unwrap();

        let stored = db.get("cus_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Trialing);
        assert!(stored.is_trial_used);
        assert_eq!(stored.trial_end, Some(1_701_209_600));
    }

    #[tokio::test]
    async fn unknown_status_fails_closed_and_leaves_row_untouched() {
        let db = Arc::new(MockDb::default());
        let mut seeded = SubscriptionRecord::not_started("cus_1");
        seeded.status = SubscriptionStatus::Active;
        db.seed_subscription(seeded);

        let stripe = MockStripeService::new().with_subscription(snapshot("galactic"));
        let state = test_state(db.clone(), stripe, MockNotifier::default());

        let err = sync_customer_from_stripe(&state, "cus_1").await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownStatus(_)));

        let stored = db.get("cus_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }
}
