use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CoachReplyRequest, CoachReplyResponse, CoachRequest, CoachResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(get_coach_advice))
        .route("/reply", post(coach_reply))
}

/// POST /coach/reply
/// Chat reply from the selected coach. Provider failures never surface here.
#[axum::debug_handler]
pub async fn coach_reply(
    State(state): State<AppState>,
    Json(request): Json<CoachReplyRequest>,
) -> Result<Json<CoachReplyResponse>, AppError> {
    let request_id = Uuid::new_v4();
    info!(
        "POST /coach/reply [{}] - style: {}, has_message: {}, has_action: {}",
        request_id,
        request.style(),
        request.user_message().is_some(),
        request.action.is_some()
    );

    request.validate().map_err(|e| {
        warn!("POST /coach/reply [{}] rejected: {}", request_id, e);
        AppError::Validation(e)
    })?;

    let result = state.coach_chat.generate_reply(&request).await;
    info!("POST /coach/reply [{}] - source={}", request_id, result.source);

    Ok(Json(CoachReplyResponse { reply: result.text }))
}

/// POST /coach
/// Structured advice for the player's level and portfolio.
#[axum::debug_handler]
pub async fn get_coach_advice(
    State(state): State<AppState>,
    Json(request): Json<CoachRequest>,
) -> Result<Json<CoachResponse>, AppError> {
    info!(
        "POST /coach - level: {}, goal: {}, risk: {}",
        request.player_level, request.investment_goal, request.risk_tolerance
    );

    request.validate().map_err(|e| {
        warn!("POST /coach rejected: {}", e);
        AppError::Validation(e)
    })?;

    Ok(Json(state.coach_advice.get_advice(&request).await))
}
