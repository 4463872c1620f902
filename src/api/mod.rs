pub mod auth;
pub mod checkout;
pub mod purchases;
pub mod stripe_client;
pub mod webhooks;
