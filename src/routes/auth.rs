//! Bearer-token guard for the dashboard API

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::AppState;

/// Extractor that accepts only `Authorization: Bearer <DASHBOARD_TOKEN>`
pub struct Authorized;

impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // an unset token locks the API
        if state.dashboard_token.is_empty() {
            log::warn!("[dashboard] DASHBOARD_TOKEN is not set, rejecting API call");
            return Err(StatusCode::UNAUTHORIZED);
        }

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if token.trim() != state.dashboard_token {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Authorized)
    }
}
