//! Operational triggers. Both enqueue a job and return without waiting.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::jobs::{DrainReason, enqueue_drain_views_job, enqueue_refresh_trending_job};
use crate::infra::http::api::error::{ApiError, repo_to_api};
use crate::infra::http::api::models::JobAcceptedResponse;
use crate::infra::http::api::state::ApiState;

pub async fn refresh_trending(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = enqueue_refresh_trending_job(state.jobs.as_ref(), Some("api".to_string()))
        .await
        .map_err(repo_to_api)?;
    Ok((StatusCode::ACCEPTED, Json(JobAcceptedResponse { job_id })))
}

pub async fn drain_views(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let job_id = enqueue_drain_views_job(state.jobs.as_ref(), DrainReason::Manual, None)
        .await
        .map_err(repo_to_api)?;
    Ok((StatusCode::ACCEPTED, Json(JobAcceptedResponse { job_id })))
}
