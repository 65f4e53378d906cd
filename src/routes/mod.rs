pub mod auth;
pub mod automation;
pub mod config;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the dashboard
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(automation::routes())
        .merge(config::routes())
}
