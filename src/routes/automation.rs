//! Automation control endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::routes::auth::Authorized;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/test", post(test_run))
        .route("/api/mobile/quick-action/{action}", post(quick_action))
}

#[derive(Serialize)]
struct ActionResponse {
    status: &'static str,
    message: String,
}

/// `{"status": "success"|"error", "message": ...}` with the given code
pub(crate) fn reply(code: StatusCode, message: impl Into<String>) -> Response {
    let status = if code.is_success() { "success" } else { "error" };
    let body = ActionResponse {
        status,
        message: message.into(),
    };
    (code, Json(body)).into_response()
}

/// GET /health - liveness, no auth
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
    }))
}

/// GET /api/status - session counters, recent uploads and activity
async fn status(State(state): State<Arc<AppState>>, _auth: Authorized) -> Response {
    do_status(&state).await
}

async fn start(State(state): State<Arc<AppState>>, _auth: Authorized) -> Response {
    do_start(&state)
}

async fn stop(State(state): State<Arc<AppState>>, _auth: Authorized) -> Response {
    do_stop(&state)
}

/// POST /api/test - run the pipeline once in the background
async fn test_run(State(state): State<Arc<AppState>>, _auth: Authorized) -> Response {
    do_test(&state)
}

/// POST /api/mobile/quick-action/{action}
async fn quick_action(
    State(state): State<Arc<AppState>>,
    _auth: Authorized,
    Path(action): Path<String>,
) -> Response {
    match action.as_str() {
        "start" => do_start(&state),
        "stop" => do_stop(&state),
        "test" => do_test(&state),
        "status" => do_status(&state).await,
        _ => reply(StatusCode::BAD_REQUEST, "Invalid action"),
    }
}

async fn do_status(state: &AppState) -> Response {
    Json(state.session.stats().await).into_response()
}

fn do_start(state: &AppState) -> Response {
    if state.session.is_running() {
        return reply(StatusCode::CONFLICT, "Automation already running");
    }
    if state.session.start() {
        reply(StatusCode::OK, "Automation started")
    } else {
        reply(
            StatusCode::BAD_REQUEST,
            "Could not start, check automation settings",
        )
    }
}

fn do_stop(state: &AppState) -> Response {
    if state.session.stop() {
        reply(StatusCode::OK, "Automation stopped")
    } else {
        reply(StatusCode::OK, "Automation was not running")
    }
}

fn do_test(state: &AppState) -> Response {
    if state.session.is_busy() {
        return reply(StatusCode::CONFLICT, "A run is already in progress");
    }

    let session = state.session.clone();
    tokio::spawn(async move {
        let ok = session.run_once().await;
        log::info!("[dashboard] Test run finished, success={}", ok);
    });
    reply(StatusCode::ACCEPTED, "Test run started")
}
