//! Raw view events and their buffered wire format.
//!
//! Buffered records are plain strings of the form `"{thread_id}:{unix_seconds}"`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub content_id: i64,
    pub occurred_at: OffsetDateTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewRecordError {
    #[error("view record `{record}` is missing the `:` separator")]
    MissingSeparator { record: String },
    #[error("view record `{record}` has an invalid content id")]
    InvalidContentId { record: String },
    #[error("view record `{record}` has an invalid timestamp")]
    InvalidTimestamp { record: String },
}

impl ViewEvent {
    pub fn new(content_id: i64, occurred_at: OffsetDateTime) -> Self {
        Self {
            content_id,
            occurred_at,
        }
    }

    /// Event stamped with the current wall clock, truncated to whole seconds.
    pub fn now(content_id: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        let occurred_at =
            OffsetDateTime::from_unix_timestamp(now.unix_timestamp()).unwrap_or(now);
        Self::new(content_id, occurred_at)
    }

    pub fn encode(&self) -> String {
        format!(
            "{}:{}",
            self.content_id,
            self.occurred_at.unix_timestamp()
        )
    }

    pub fn parse(record: &str) -> Result<Self, ViewRecordError> {
        let (id, ts) = record
            .split_once(':')
            .ok_or_else(|| ViewRecordError::MissingSeparator {
                record: record.to_string(),
            })?;

        let content_id = id
            .trim()
            .parse::<i64>()
            .map_err(|_| ViewRecordError::InvalidContentId {
                record: record.to_string(),
            })?;

        let occurred_at = ts
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            .ok_or_else(|| ViewRecordError::InvalidTimestamp {
                record: record.to_string(),
            })?;

        Ok(Self::new(content_id, occurred_at))
    }
}

/// Parses a whole batch, failing on the first corrupt record.
pub fn parse_batch(records: &[String]) -> Result<Vec<ViewEvent>, ViewRecordError> {
    records.iter().map(|record| ViewEvent::parse(record)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn encode_uses_unix_seconds() {
        let event = ViewEvent::new(42, datetime!(2024-01-01 00:00:10 UTC));
        assert_eq!(event.encode(), "42:1704067210");
        assert_eq!(ViewEvent::parse(&event.encode()), Ok(event));
    }

    #[test]
    fn parse_rejects_corrupt_records() {
        assert!(matches!(
            ViewEvent::parse("42"),
            Err(ViewRecordError::MissingSeparator { .. })
        ));
        assert!(matches!(
            ViewEvent::parse("abc:1704067210"),
            Err(ViewRecordError::InvalidContentId { .. })
        ));
        assert!(matches!(
            ViewEvent::parse("42:yesterday"),
            Err(ViewRecordError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn batch_parse_is_all_or_nothing() {
        let records = vec![
            "1:1704067200".to_string(),
            "garbage".to_string(),
            "2:1704067201".to_string(),
        ];
        assert!(parse_batch(&records).is_err());

        let clean = vec!["1:1704067200".to_string(), "2:1704067201".to_string()];
        let events = parse_batch(&clean).expect("clean batch parses");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].content_id, 2);
    }
}
