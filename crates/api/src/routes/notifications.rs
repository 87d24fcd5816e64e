//! Notification maintenance routes.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use prize_common::error::AppError;
use prize_notifier::diagnostics::{DiagnosticsReport, run_diagnostics};
use prize_notifier::tracker::RetrySummary;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/retry", post(retry_pending))
        .route("/api/notifications/diagnostics", get(diagnostics))
}

/// POST /api/notifications/retry: re-attempt every unnotified prize now.
async fn retry_pending(State(state): State<AppState>) -> Result<Json<RetrySummary>, AppError> {
    let summary = state.tracker.retry_pending().await?;
    Ok(Json(summary))
}

/// GET /api/notifications/diagnostics: verify each provider without sending.
async fn diagnostics(State(state): State<AppState>) -> Json<DiagnosticsReport> {
    Json(run_diagnostics(state.tracker.dispatcher()).await)
}
