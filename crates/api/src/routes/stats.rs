use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use prize_common::error::AppError;
use prize_engine::stats::{PrizeStats, prize_stats};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stats", get(get_stats))
}

/// GET /api/stats: totals for the admin dashboard.
async fn get_stats(State(state): State<AppState>) -> Result<Json<PrizeStats>, AppError> {
    let stats = prize_stats(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(stats))
}
