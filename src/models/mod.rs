pub mod customer;
pub mod order;
pub mod subscription;
pub mod trial_email;
pub mod user;
