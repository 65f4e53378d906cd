//! shortsbot: fetch a joke, render it as a vertical short, upload it to
//! YouTube, once a day.

pub mod config;
pub mod constants;
pub mod domain;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod storage;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use services::automation::AutomationSession;

/// Shared state for the dashboard routes
pub struct AppState {
    pub session: Arc<AutomationSession>,
    /// Required as `Authorization: Bearer <token>` on every `/api` route
    pub dashboard_token: String,
}
