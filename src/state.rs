use std::sync::Arc;

use crate::config::Config;
use crate::db::customer_repository::CustomerStore;
use crate::db::order_repository::OrderStore;
use crate::db::subscription_repository::SubscriptionStore;
use crate::db::trial_email_repository::TrialEmailStore;
use crate::db::user_repository::UserRepository;
use crate::services::notifier::TrialNotifier;
use crate::services::stripe::StripeService;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub customers: Arc<dyn CustomerStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub orders: Arc<dyn OrderStore>,
    pub trial_emails: Arc<dyn TrialEmailStore>,
    pub stripe: Arc<dyn StripeService>,
    pub notifier: Arc<dyn TrialNotifier>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}
