//! Remote control for the automation session.
//!
//! ## Environment Variables
//! - `PORT` - port to listen on (default: `5000`)
//! - `DASHBOARD_TOKEN` - bearer token required on `/api` routes
//! - `SHORTSBOT_CONFIG` - settings file (default: `config.json`)

use anyhow::Context;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use shortsbot::AppState;
use shortsbot::config::ConfigStore;
use shortsbot::logging;
use shortsbot::routes::build_routes;
use shortsbot::services::automation::AutomationSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(None);

    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let config_path =
        std::env::var("SHORTSBOT_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let dashboard_token = std::env::var("DASHBOARD_TOKEN").unwrap_or_default();
    if dashboard_token.is_empty() {
        log::warn!("[dashboard] DASHBOARD_TOKEN is not set, /api routes will reject every call");
    }

    let config = ConfigStore::load(&config_path);
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("[dashboard] {}", e);
        }
    }
    config
        .create_directories()
        .context("failed to create working directories")?;

    let state = Arc::new(AppState {
        session: Arc::new(AutomationSession::new(config)),
        dashboard_token,
    });

    let app = build_routes()
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    log::info!("[dashboard] Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server failed")?;

    state.session.stop();
    Ok(())
}
