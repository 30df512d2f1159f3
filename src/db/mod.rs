pub mod customer_repository;
pub mod order_repository;
pub mod subscription_repository;
pub mod trial_email_repository;
pub mod user_repository;

pub mod postgres_customer_repository;
pub mod postgres_order_repository;
pub mod postgres_subscription_repository;
pub mod postgres_trial_email_repository;
pub mod postgres_user_repository;

pub mod mock_db;
