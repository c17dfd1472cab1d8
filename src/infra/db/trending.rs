use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{RepoError, TrendingRepo},
    domain::trending::{TrendingEntry, TrendingSnapshot},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TrendingRow {
    thread_id: i64,
    score: i64,
    refreshed_at: OffsetDateTime,
}

#[async_trait]
impl TrendingRepo for PostgresRepositories {
    async fn refresh_snapshot(&self) -> Result<(), RepoError> {
        // CONCURRENTLY keeps the previous snapshot readable until the new one
        // is swapped in; it relies on trending_threads_id_idx.
        sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY trending_threads")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load_snapshot(&self, limit: usize) -> Result<TrendingSnapshot, RepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, TrendingRow>(
            r#"
            SELECT thread_id, score, refreshed_at
            FROM trending_threads
            WHERE score > 0
            ORDER BY score DESC, thread_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let refreshed_at = rows.first().map(|row| row.refreshed_at);
        let entries = rows
            .into_iter()
            .map(|row| TrendingEntry {
                thread_id: row.thread_id,
                score: row.score,
            })
            .collect();

        Ok(TrendingSnapshot {
            entries,
            refreshed_at,
        })
    }
}
