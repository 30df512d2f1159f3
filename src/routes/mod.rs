pub mod auth;
pub mod cancel;
pub mod checkout;
pub mod products;
pub mod webhook;
