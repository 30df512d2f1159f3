use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::models::trial_email::TrialEmailType;
use crate::state::AppState;

const SEVEN_DAYS_SECS: i64 = 7 * 24 * 60 * 60;
const FORTY_EIGHT_HOURS_SECS: i64 = 48 * 60 * 60;

/// Maps a subscription status transition to the trial lifecycle notifications
/// it triggers. Pure so the milestone rules are testable without webhooks.
pub fn trial_transitions(
    status: Option<&str>,
    previous_status: Option<&str>,
    trial_end: Option<i64>,
    now: i64,
) -> Vec<TrialEmailType> {
    let mut kinds = Vec::new();
    let was_trialing = previous_status == Some("trialing");

    match status {
        Some("trialing") => {
            // Every trialing event sends "started"; dedup is the ledger's
            // problem, not this function's.
            kinds.push(TrialEmailType::TrialStarted);
            if let Some(end) = trial_end {
                let remaining = end - now;
                // Independent thresholds: inside 48 hours both reminders fire.
                if remaining > 0 && remaining <= SEVEN_DAYS_SECS {
                    kinds.push(TrialEmailType::TrialReminder7Day);
                }
                if remaining > 0 && remaining <= FORTY_EIGHT_HOURS_SECS {
                    kinds.push(TrialEmailType::TrialReminder48Hr);
                }
            }
        }
        Some("active") if was_trialing => kinds.push(TrialEmailType::TrialConverted),
        Some(_) if was_trialing => kinds.push(TrialEmailType::TrialEnded),
        _ => {}
    }

    kinds
}

/// Inspects a `customer.subscription.*` event for trial milestones and fires
/// the matching notifications. Best-effort: notification or ledger failures
/// are logged and never bubble up to the webhook acknowledgement path.
pub async fn handle_subscription_event(state: &AppState, event_type: &str, payload: &Value) {
    let object = &payload["data"]["object"];
    let Some(customer_id) = object["customer"].as_str() else {
        return;
    };

    let status = object["status"].as_str();
    let previous_status = payload["data"]["previous_attributes"]["status"].as_str();
    let trial_end = object["trial_end"].as_i64();
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let kinds = trial_transitions(status, previous_status, trial_end, now);
    if kinds.is_empty() {
        return;
    }

    let user_id = match state.customers.find_user_by_customer_id(customer_id).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!(customer_id, "trial event for unmapped customer, skipping");
            return;
        }
        Err(err) => {
            error!(customer_id, error = %err, "customer lookup failed for trial event");
            return;
        }
    };

    let email = match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => user.email,
        Ok(None) => {
            warn!(%user_id, "trial event for missing user, skipping");
            return;
        }
        Err(err) => {
            error!(%user_id, error = %err, "user lookup failed for trial event");
            return;
        }
    };

    for kind in kinds {
        if let Err(err) = state.notifier.notify(user_id, &email, kind).await {
            error!(%user_id, kind = %kind, error = %err, "trial notification failed");
        }
        let metadata = json!({
            "event_type": event_type,
            "customer_id": customer_id,
            "trial_end": trial_end,
        });
        if let Err(err) = state.trial_emails.append(user_id, kind, metadata).await {
            error!(%user_id, kind = %kind, error = %err, "trial email ledger append failed");
        }
    }
}
