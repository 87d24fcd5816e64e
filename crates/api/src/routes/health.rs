//! Liveness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health: process is up. Does not touch storage or providers.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "prize-api",
        "version": env!("CARGO_PKG_VERSION"),
        "store": if state.config.database_url.is_some() { "postgres" } else { "memory" },
        "email_providers": state.tracker.dispatcher().provider_count(),
    }))
}
