#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::customer_repository::CustomerStore;
use crate::db::order_repository::OrderStore;
use crate::db::subscription_repository::SubscriptionStore;
use crate::db::trial_email_repository::TrialEmailStore;
use crate::db::user_repository::UserRepository;
use crate::models::customer::CustomerMapping;
use crate::models::order::Order;
use crate::models::subscription::{SubscriptionRecord, SubscriptionStatus};
use crate::models::trial_email::{TrialEmailEntry, TrialEmailType};
use crate::models::user::AuthUser;

/// In-memory implementation of every store trait, mirroring the Postgres
/// semantics tests care about: race-safe mapping insert (existing row wins),
/// full-row subscription replace with monotonic `is_trial_used`, and the
/// global trial-usage lookup that ignores soft deletion.
#[derive(Default)]
pub struct MockDb {
    pub users: Mutex<Vec<AuthUser>>,
    pub mappings: Mutex<Vec<CustomerMapping>>,
    pub subscriptions: Mutex<HashMap<String, SubscriptionRecord>>,
    pub orders: Mutex<Vec<Order>>,
    pub trial_emails: Mutex<Vec<TrialEmailEntry>>,
    pub fail_mapping_insert: Mutex<bool>,
    pub fail_subscription_writes: Mutex<bool>,
    /// One-shot: the next `insert_mapping` call finds this customer already
    /// mapped for the user, as if a concurrent request committed between the
    /// caller's lookup and its insert.
    pub mapping_race_winner: Mutex<Option<String>>,
}

impl MockDb {
    pub fn with_user(self, user: AuthUser) -> Self {
        self.users.lock().unwrap().push(user);
        self
    }

    pub fn seed_mapping(&self, user_id: Uuid, customer_id: &str) {
        self.mappings.lock().unwrap().push(CustomerMapping {
            user_id,
            customer_id: customer_id.to_string(),
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        });
    }

    pub fn seed_subscription(&self, record: SubscriptionRecord) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(record.customer_id.clone(), record);
    }

    fn db_failure() -> sqlx::Error {
        sqlx::Error::Protocol("mock db failure".into())
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<AuthUser>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }
}

#[async_trait]
impl CustomerStore for MockDb {
    async fn find_mapping(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CustomerMapping>, sqlx::Error> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.deleted_at.is_none())
            .cloned())
    }

    async fn insert_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<CustomerMapping, sqlx::Error> {
        if *self.fail_mapping_insert.lock().unwrap() {
            return Err(Self::db_failure());
        }
        let mut mappings = self.mappings.lock().unwrap();
        if let Some(winner) = self.mapping_race_winner.lock().unwrap().take() {
            mappings.push(CustomerMapping {
                user_id,
                customer_id: winner,
                created_at: OffsetDateTime::now_utc(),
                deleted_at: None,
            });
        }
        if let Some(existing) = mappings
            .iter()
            .find(|m| m.user_id == user_id && m.deleted_at.is_none())
        {
            // Conflict on the partial unique index: the existing row wins.
            return Ok(existing.clone());
        }
        let mapping = CustomerMapping {
            user_id,
            customer_id: customer_id.to_string(),
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        };
        mappings.push(mapping.clone());
        Ok(mapping)
    }

    async fn soft_delete_mapping(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        let mut mappings = self.mappings.lock().unwrap();
        for m in mappings.iter_mut() {
            if m.user_id == user_id && m.customer_id == customer_id && m.deleted_at.is_none() {
                m.deleted_at = Some(OffsetDateTime::now_utc());
            }
        }
        Ok(())
    }

    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.customer_id == customer_id && m.deleted_at.is_none())
            .map(|m| m.user_id))
    }
}

#[async_trait]
impl SubscriptionStore for MockDb {
    async fn get(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        Ok(self.subscriptions.lock().unwrap().get(customer_id).cloned())
    }

    async fn insert_not_started_if_absent(&self, customer_id: &str) -> Result<(), sqlx::Error> {
        if *self.fail_subscription_writes.lock().unwrap() {
            return Err(Self::db_failure());
        }
        self.subscriptions
            .lock()
            .unwrap()
            .entry(customer_id.to_string())
            .or_insert_with(|| SubscriptionRecord::not_started(customer_id));
        Ok(())
    }

    async fn replace(&self, record: &SubscriptionRecord) -> Result<(), sqlx::Error> {
        if *self.fail_subscription_writes.lock().unwrap() {
            return Err(Self::db_failure());
        }
        let mut subs = self.subscriptions.lock().unwrap();
        let mut record = record.clone();
        if let Some(existing) = subs.get(&record.customer_id) {
            record.is_trial_used = existing.is_trial_used || record.is_trial_used;
        }
        record.updated_at = OffsetDateTime::now_utc();
        subs.insert(record.customer_id.clone(), record);
        Ok(())
    }

    async fn set_cancel_at_period_end(
        &self,
        customer_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<(), sqlx::Error> {
        let mut subs = self.subscriptions.lock().unwrap();
        if let Some(record) = subs.get_mut(customer_id) {
            record.cancel_at_period_end = cancel_at_period_end;
            record.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn has_user_used_trial(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let mappings = self.mappings.lock().unwrap();
        let subs = self.subscriptions.lock().unwrap();
        Ok(mappings
            .iter()
            .filter(|m| m.user_id == user_id)
            .any(|m| {
                subs.get(&m.customer_id)
                    .map(|s| s.is_trial_used)
                    .unwrap_or(false)
            }))
    }

    async fn delete(&self, customer_id: &str) -> Result<(), sqlx::Error> {
        self.subscriptions.lock().unwrap().remove(customer_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MockDb {
    async fn insert_order(&self, order: &Order) -> Result<(), sqlx::Error> {
        let mut orders = self.orders.lock().unwrap();
        if orders
            .iter()
            .any(|o| o.checkout_session_id == order.checkout_session_id)
        {
            return Ok(());
        }
        orders.push(order.clone());
        Ok(())
    }
}

#[async_trait]
impl TrialEmailStore for MockDb {
    async fn append(
        &self,
        user_id: Uuid,
        email_type: TrialEmailType,
        metadata: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        self.trial_emails.lock().unwrap().push(TrialEmailEntry {
            user_id,
            email_type,
            metadata,
            sent_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }
}
