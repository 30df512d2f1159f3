use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::models::trial_email::TrialEmailType;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification error: {0}")]
    Other(String),
}

/// Dispatcher for trial lifecycle notifications. Delivery is a stub in this
/// service: the production implementation writes a structured log line and the
/// real email pipeline lives elsewhere. The append-only ledger row is written
/// by the caller, not here.
#[async_trait]
pub trait TrialNotifier: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        email: &str,
        kind: TrialEmailType,
    ) -> Result<(), NotifyError>;
}

pub struct LogNotifier;

#[async_trait]
impl TrialNotifier for LogNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        email: &str,
        kind: TrialEmailType,
    ) -> Result<(), NotifyError> {
        info!(%user_id, email, kind = %kind, "trial notification dispatched");
        Ok(())
    }
}

/// Records notifications for assertions in tests.
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<(Uuid, String, TrialEmailType)>>>,
    pub fail_send: Arc<Mutex<bool>>,
}

#[async_trait]
impl TrialNotifier for MockNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        email: &str,
        kind: TrialEmailType,
    ) -> Result<(), NotifyError> {
        if *self.fail_send.lock().unwrap() {
            return Err(NotifyError::Other("mock notifier failure".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, email.to_string(), kind));
        Ok(())
    }
}
