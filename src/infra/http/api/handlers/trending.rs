//! Trending and similar-thread reads

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::domain::trending::TRENDING_TOP_N;
use crate::infra::http::api::error::{ApiError, similarity_to_api};
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn trending(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(TRENDING_TOP_N).clamp(1, TRENDING_TOP_N);
    let threads = state.trending.get_trending(limit).await;

    Ok(Json(TrendingResponse { threads }))
}

pub async fn similar_threads(
    State(state): State<ApiState>,
    Path(thread_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SIMILAR_LIMIT)
        .min(MAX_SIMILAR_LIMIT);

    let threads = state
        .similarity
        .get_similar(thread_id, limit)
        .await
        .map_err(similarity_to_api)?;

    Ok(Json(SimilarResponse { thread_id, threads }))
}
