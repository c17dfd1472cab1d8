use serde::{Deserialize, Serialize};

use crate::domain::entities::{SimilarThread, TagRecord};
use crate::domain::trending::TrendingEntry;

pub const DEFAULT_SIMILAR_LIMIT: usize = 5;
pub const MAX_SIMILAR_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecordViewResponse {
    pub thread_id: i64,
    pub queue_len: usize,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub threads: Vec<TrendingEntry>,
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub thread_id: i64,
    pub threads: Vec<SimilarThread>,
}

#[derive(Debug, Deserialize)]
pub struct TagCreateRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Deserialize)]
pub struct TagAssignRequest {
    pub thread_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TagAssignResponse {
    pub tag_id: i64,
    pub thread_id: i64,
    /// False when the pair already existed.
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategoryCreateRequest {
    pub title: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadCreateRequest {
    pub title: String,
    pub category_id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    pub job_id: String,
}
