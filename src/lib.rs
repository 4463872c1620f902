pub mod access;
pub mod api;
pub mod db;
pub mod docs;
pub mod models;

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub stripe_api_key: String,
    pub stripe_webhook_secret: String,
    pub frontend_base_url: String,
}
