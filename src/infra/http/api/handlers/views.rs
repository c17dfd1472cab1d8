//! View ingestion handler

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::infra::http::api::error::{ApiError, views_to_api};
use crate::infra::http::api::models::RecordViewResponse;
use crate::infra::http::api::state::ApiState;

/// Buffers the view and returns immediately; existence of the thread is
/// checked only when the batch is persisted.
pub async fn record_view(
    State(state): State<ApiState>,
    Path(thread_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let queue_len = state.views.record(thread_id).await.map_err(views_to_api)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RecordViewResponse {
            thread_id,
            queue_len,
        }),
    ))
}
