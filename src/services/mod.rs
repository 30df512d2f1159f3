pub mod notifier;
pub mod stripe;
