// Library exports for the API binary, the maintenance CLI and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use error::{ApiError, Rejection};
use services::email::EmailService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Connections are opened per use so the API keeps serving when Redis
    /// is down (rate limits then fail open).
    pub redis: redis::Client,
    pub config: Arc<Config>,
    pub email: Option<Arc<EmailService>>,
}

impl AppState {
    /// Turns a service error into the handler rejection, exposing internal
    /// messages outside production only.
    pub fn reject(&self, err: ApiError) -> Rejection {
        err.into_rejection(!self.config.is_production())
    }
}
