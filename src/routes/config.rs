use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::AppState;
use crate::routes::auth::Authorized;
use crate::routes::automation::reply;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config).post(update_config))
}

/// The short keys the mobile client sends, plus any dotted paths.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigUpdate {
    upload_time: Option<String>,
    privacy: Option<String>,
    /// e.g. `{"video_creation.fps": 24}`
    settings: Map<String, Value>,
}

impl ConfigUpdate {
    fn into_changes(self) -> Vec<(String, Value)> {
        let mut changes: Vec<(String, Value)> = self.settings.into_iter().collect();
        if let Some(time) = self.upload_time {
            changes.push(("automation.daily_upload_time".into(), Value::String(time)));
        }
        if let Some(privacy) = self.privacy {
            changes.push(("automation.upload_privacy".into(), Value::String(privacy)));
        }
        changes
    }
}

async fn get_config(State(state): State<Arc<AppState>>, _auth: Authorized) -> Json<Value> {
    Json(state.session.settings())
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    _auth: Authorized,
    Json(update): Json<ConfigUpdate>,
) -> Result<Response, StatusCode> {
    let changes = update.into_changes();
    if changes.is_empty() {
        return Ok(reply(StatusCode::BAD_REQUEST, "No settings given"));
    }

    state
        .session
        .set_settings(changes)
        .log_status("Config update rejected", StatusCode::BAD_REQUEST)?;
    Ok(reply(StatusCode::OK, "Configuration updated"))
}
