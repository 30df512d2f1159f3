use core::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Trial lifecycle milestones recorded in the append-only email ledger.
/// `CheckoutAttempted` is the checkout path's best-effort audit row; the rest
/// correspond to notifications dispatched from webhook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialEmailType {
    TrialStarted,
    TrialReminder7Day,
    TrialReminder48Hr,
    TrialEnded,
    TrialConverted,
    TrialCheckoutAttempted,
}

impl TrialEmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialEmailType::TrialStarted => "trial_started",
            TrialEmailType::TrialReminder7Day => "trial_reminder_7day",
            TrialEmailType::TrialReminder48Hr => "trial_reminder_48hr",
            TrialEmailType::TrialEnded => "trial_ended",
            TrialEmailType::TrialConverted => "trial_converted",
            TrialEmailType::TrialCheckoutAttempted => "trial_checkout_attempted",
        }
    }
}

impl fmt::Display for TrialEmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialEmailEntry {
    pub user_id: Uuid,
    pub email_type: TrialEmailType,
    pub metadata: serde_json::Value,
    pub sent_at: OffsetDateTime,
}
