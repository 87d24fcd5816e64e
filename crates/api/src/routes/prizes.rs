//! Prize registration and lookup routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use prize_common::error::AppError;
use prize_engine::cooldown::Eligibility;
use prize_engine::registration::{RegisterPrizeParams, Registration};
use prize_engine::stats::{PrizeListing, list_prizes};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/prizes", get(get_prizes).post(register_prize))
        .route("/api/prizes/eligibility", get(check_eligibility))
}

#[derive(Debug, Deserialize)]
struct EligibilityQuery {
    email: Option<String>,
}

/// POST /api/prizes: record a win and queue its notifications.
///
/// Responds before any email is sent; `notification_queued` only says whether
/// the job reached the delivery queue.
async fn register_prize(
    State(state): State<AppState>,
    payload: Result<Json<RegisterPrizeParams>, JsonRejection>,
) -> Result<(StatusCode, Json<Registration>), AppError> {
    let Json(params) = payload?;
    let registration = state.registrar.register(&params).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /api/prizes: every prize, newest first.
async fn get_prizes(State(state): State<AppState>) -> Result<Json<PrizeListing>, AppError> {
    let listing = list_prizes(state.store.as_ref()).await?;
    Ok(Json(listing))
}

/// GET /api/prizes/eligibility?email=
async fn check_eligibility(
    State(state): State<AppState>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<Eligibility>, AppError> {
    let email = query
        .email
        .ok_or_else(|| AppError::Validation("Email is required".into()))?;
    let eligibility = state.registrar.check_eligibility(&email).await?;
    Ok(Json(eligibility))
}
