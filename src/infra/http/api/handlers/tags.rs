//! Tags handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::tags::CreateTagCommand;
use crate::infra::http::api::error::{ApiError, tags_to_api};
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn list_tags(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let tags = state.tags.list_all().await.map_err(tags_to_api)?;
    Ok(Json(TagListResponse { tags }))
}

pub async fn create_tag(
    State(state): State<ApiState>,
    Json(payload): Json<TagCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateTagCommand {
        name: payload.name,
        description: payload.description,
    };

    let tag = state.tags.create_tag(command).await.map_err(tags_to_api)?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn assign_tag(
    State(state): State<ApiState>,
    Path(tag_id): Path<i64>,
    Json(payload): Json<TagAssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .tags
        .assign_tag(tag_id, payload.thread_id)
        .await
        .map_err(tags_to_api)?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(TagAssignResponse {
            tag_id,
            thread_id: payload.thread_id,
            created,
        }),
    ))
}

pub async fn list_thread_tags(
    State(state): State<ApiState>,
    Path(thread_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state
        .tags
        .list_for_thread(thread_id)
        .await
        .map_err(tags_to_api)?;
    Ok(Json(TagListResponse { tags }))
}
