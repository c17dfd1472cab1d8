//! Trending score rules shared by the SQL materialized view and the in-memory
//! materializer.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::views::ViewEvent;

/// Number of entries kept in a materialized snapshot.
pub const TRENDING_TOP_N: usize = 10;

pub const DAY_WINDOW: Duration = Duration::days(1);
pub const WEEK_WINDOW: Duration = Duration::days(7);
pub const MONTH_WINDOW: Duration = Duration::days(30);

pub const DAY_WEIGHT: i64 = 5;
pub const WEEK_WEIGHT: i64 = 2;
pub const MONTH_WEIGHT: i64 = 1;

/// Views of a single thread counted independently per window.
/// Windows are half-open and overlap, so a view from the last day counts in
/// all three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub day: i64,
    pub week: i64,
    pub month: i64,
}

impl WindowCounts {
    pub fn observe(&mut self, occurred_at: OffsetDateTime, now: OffsetDateTime) {
        let age = now - occurred_at;
        if age >= MONTH_WINDOW {
            return;
        }
        self.month += 1;
        if age < WEEK_WINDOW {
            self.week += 1;
        }
        if age < DAY_WINDOW {
            self.day += 1;
        }
    }

    pub fn score(&self) -> i64 {
        trending_score(self.day, self.week, self.month)
    }
}

pub fn trending_score(day: i64, week: i64, month: i64) -> i64 {
    DAY_WEIGHT * day + WEEK_WEIGHT * week + MONTH_WEIGHT * month
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub thread_id: i64,
    pub score: i64,
}

/// Ranked top-N result, replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSnapshot {
    pub entries: Vec<TrendingEntry>,
    /// `None` until the first materialization has produced any rows.
    pub refreshed_at: Option<OffsetDateTime>,
}

impl TrendingSnapshot {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            refreshed_at: None,
        }
    }

    pub fn top(&self, limit: usize) -> Vec<TrendingEntry> {
        self.entries.iter().take(limit).copied().collect()
    }
}

/// Orders entries by score descending, then thread id ascending, dropping
/// zero scores and keeping at most `limit`.
pub fn rank(mut entries: Vec<TrendingEntry>, limit: usize) -> Vec<TrendingEntry> {
    entries.retain(|entry| entry.score > 0);
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.thread_id.cmp(&b.thread_id))
    });
    entries.truncate(limit);
    entries
}

/// Computes a fresh snapshot from raw events in a single pass.
pub fn materialize<'a, I>(events: I, now: OffsetDateTime) -> TrendingSnapshot
where
    I: IntoIterator<Item = &'a ViewEvent>,
{
    let mut counts = std::collections::HashMap::<i64, WindowCounts>::new();
    for event in events {
        counts
            .entry(event.content_id)
            .or_default()
            .observe(event.occurred_at, now);
    }

    let entries = counts
        .into_iter()
        .map(|(thread_id, counts)| TrendingEntry {
            thread_id,
            score: counts.score(),
        })
        .collect();

    TrendingSnapshot {
        entries: rank(entries, TRENDING_TOP_N),
        refreshed_at: Some(now),
    }
}
