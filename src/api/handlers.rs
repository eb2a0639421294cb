use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::models::{InteractionType, ProductId, Recommendation, UserId};
use crate::services::TrackOutcome;

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub count: Option<i64>,
}

impl CountQuery {
    /// Requested count, `default` when absent; zero or negative is rejected
    pub fn resolve(&self, default: usize) -> AppResult<usize> {
        match self.count {
            None => Ok(default),
            Some(count) if count > 0 => Ok(count as usize),
            Some(count) => Err(AppError::InvalidInput(format!(
                "count must be greater than zero, got {}",
                count
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackInteractionRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub interaction_type: InteractionType,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Personalized recommendations for one user
pub async fn user_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<UserId>,
    Query(query): Query<CountQuery>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let count = query.resolve(state.default_count)?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        count,
        "Processing recommendation request"
    );

    let recommendations = state.engine.get_recommendations(user_id, count).await?;
    Ok(Json(recommendations))
}

/// Popularity-based recommendations for anonymous visitors
pub async fn guest_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<CountQuery>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let count = query.resolve(state.default_count)?;

    tracing::info!(request_id = %request_id, count, "Processing guest recommendation request");

    let recommendations = state.engine.get_guest_recommendations(count).await?;
    Ok(Json(recommendations))
}

/// Drops a user's cached recommendations
pub async fn invalidate_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> StatusCode {
    state.engine.cache().invalidate(user_id);
    StatusCode::NO_CONTENT
}

/// Records an interaction on a best-effort basis
pub async fn track_interaction(
    State(state): State<AppState>,
    Json(request): Json<TrackInteractionRequest>,
) -> (StatusCode, Json<TrackOutcome>) {
    let outcome = state
        .tracker
        .track(request.user_id, request.product_id, request.interaction_type)
        .await;

    (StatusCode::ACCEPTED, Json(outcome))
}
