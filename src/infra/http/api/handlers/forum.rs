//! Forum hierarchy handlers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::infra::http::api::error::{ApiError, forum_to_api};
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn homepage(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let sections = state.forum.homepage().await.map_err(forum_to_api)?;
    Ok(Json(sections))
}

pub async fn create_category(
    State(state): State<ApiState>,
    Json(payload): Json<CategoryCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .forum
        .create_category(&payload.title, payload.parent_id)
        .await
        .map_err(forum_to_api)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn create_thread(
    State(state): State<ApiState>,
    Json(payload): Json<ThreadCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = state
        .forum
        .create_thread(&payload.title, payload.category_id, payload.user_id)
        .await
        .map_err(forum_to_api)?;
    Ok((StatusCode::CREATED, Json(thread)))
}
