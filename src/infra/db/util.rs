use sqlx::error::{DatabaseError, ErrorKind};

use crate::application::repos::RepoError;

/// Names the forum row a violated foreign key points at.
fn missing_reference(constraint: &str) -> Option<&'static str> {
    match constraint {
        "thread_tags_thread_id_fkey" | "thread_views_thread_id_fkey" => {
            Some("thread does not exist")
        }
        "thread_tags_tag_id_fkey" => Some("tag does not exist"),
        "threads_category_id_fkey" => Some("category does not exist"),
        "categories_parent_id_fkey" => Some("parent category does not exist"),
        _ => None,
    }
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => classify_database_error(db),
        other => RepoError::from_persistence(other),
    }
}

fn classify_database_error(db: Box<dyn DatabaseError>) -> RepoError {
    match db.kind() {
        ErrorKind::UniqueViolation => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        ErrorKind::ForeignKeyViolation => RepoError::InvalidInput {
            message: db
                .constraint()
                .and_then(missing_reference)
                .map_or_else(|| db.message().to_string(), str::to_string),
        },
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => RepoError::Integrity {
            message: db.message().to_string(),
        },
        _ if db.message().contains("invalid input syntax") => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        _ if db
            .message()
            .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        _ => RepoError::from_persistence(sqlx::Error::Database(db)),
    }
}
