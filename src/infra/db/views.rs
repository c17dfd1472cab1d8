use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{RepoError, ViewEventsRepo},
    domain::views::ViewEvent,
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl ViewEventsRepo for PostgresRepositories {
    async fn insert_batch(&self, events: &[ViewEvent]) -> Result<u64, RepoError> {
        if events.is_empty() {
            return Ok(0);
        }

        let (thread_ids, occurred_at): (Vec<i64>, Vec<OffsetDateTime>) = events
            .iter()
            .map(|event| (event.content_id, event.occurred_at))
            .unzip();

        // Views of threads deleted since they were buffered are dropped here
        // instead of failing the whole batch on the foreign key.
        let result = sqlx::query(
            r#"
            INSERT INTO thread_views (thread_id, created_at)
            SELECT v.thread_id, v.created_at
            FROM UNNEST($1::BIGINT[], $2::TIMESTAMPTZ[]) AS v(thread_id, created_at)
            WHERE EXISTS (SELECT 1 FROM threads t WHERE t.id = v.thread_id)
            "#,
        )
        .bind(&thread_ids)
        .bind(&occurred_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_events(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thread_views")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
