use crate::application::error::ErrorReport;
use crate::application::forum::ForumError;
use crate::application::repos::RepoError;
use crate::application::similarity::SimilarityError;
use crate::application::tags::TagServiceError;
use crate::application::views::ViewError;
use crate::cache::CacheError;
use crate::domain::error::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const CACHE: &str = "cache_error";
    pub const CORRUPT_BUFFER: &str = "corrupt_buffer";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

pub fn cache_to_api(err: CacheError) -> ApiError {
    ApiError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        codes::CACHE,
        "Cache unavailable",
        Some(err.to_string()),
    )
}

fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::NotFound { .. } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(err.to_string()),
        ),
        DomainError::Validation { message } | DomainError::Invariant { message } => {
            ApiError::bad_request("Validation failed", Some(message))
        }
    }
}

pub fn views_to_api(err: ViewError) -> ApiError {
    match err {
        ViewError::Buffer(err) => cache_to_api(err),
        ViewError::Repo(err) => repo_to_api(err),
        err @ ViewError::Corrupt { .. } => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::CORRUPT_BUFFER,
            "Corrupt view batch",
            Some(err.to_string()),
        ),
    }
}

pub fn similarity_to_api(err: SimilarityError) -> ApiError {
    match err {
        SimilarityError::NotFound(_) => ApiError::not_found("thread not found"),
        SimilarityError::Repo(err) => repo_to_api(err),
    }
}

pub fn tags_to_api(err: TagServiceError) -> ApiError {
    match err {
        TagServiceError::Domain(err) => domain_to_api(err),
        TagServiceError::TagNotFound(_) => ApiError::not_found("tag not found"),
        TagServiceError::ThreadNotFound(_) => ApiError::not_found("thread not found"),
        TagServiceError::Repo(err) => repo_to_api(err),
        TagServiceError::Cache(err) => cache_to_api(err),
    }
}

pub fn forum_to_api(err: ForumError) -> ApiError {
    match err {
        ForumError::Domain(err) => domain_to_api(err),
        ForumError::CategoryNotFound(_) => ApiError::not_found("category not found"),
        ForumError::Repo(err) => repo_to_api(err),
        ForumError::Cache(err) => cache_to_api(err),
    }
}
