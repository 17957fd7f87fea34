//! Treatment recommendation handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::recommend::RecommendationPayload;
use crate::service;
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PestNameRequest {
    pub pest_name: String,
}

/// Categorized advice for a pest name
pub async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<PestNameRequest>, JsonRejection>,
) -> AppResult<Json<RecommendationPayload>> {
    let Json(req) = payload?;
    let payload = service::recommend_for(&state.context, &req.pest_name).await?;
    Ok(Json(payload))
}
