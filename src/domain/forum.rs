//! Hierarchy and naming rules for categories, threads and tags.
//!
//! The hierarchy is fixed at three levels: root category, child category,
//! thread.

use crate::domain::entities::CategoryRecord;
use crate::domain::error::DomainError;

pub const ROOT_LEVEL: i16 = 0;
pub const CHILD_LEVEL: i16 = 1;

const MAX_TITLE_LEN: usize = 200;
const MAX_TAG_NAME_LEN: usize = 64;

pub fn normalize_title(title: &str) -> Result<String, DomainError> {
    normalize_name(title, "title", MAX_TITLE_LEN)
}

pub fn normalize_tag_name(name: &str) -> Result<String, DomainError> {
    normalize_name(name, "tag name", MAX_TAG_NAME_LEN)
}

fn normalize_name(value: &str, field: &str, max_len: usize) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Level of a category created under `parent`.
pub fn child_level(parent: Option<&CategoryRecord>) -> Result<i16, DomainError> {
    match parent {
        None => Ok(ROOT_LEVEL),
        Some(parent) if parent.level == ROOT_LEVEL => Ok(CHILD_LEVEL),
        Some(_) => Err(DomainError::validation(
            "categories can only be nested under a root category",
        )),
    }
}

pub fn ensure_accepts_threads(category: &CategoryRecord) -> Result<(), DomainError> {
    if category.level == CHILD_LEVEL {
        Ok(())
    } else {
        Err(DomainError::validation(
            "threads must be created under a child category",
        ))
    }
}
