use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateCategoryParams, CreateThreadParams, ForumRepo, RepoError},
    domain::entities::{
        CategoryRecord, HomepageCategory, HomepageSection, ThreadRecord,
    },
    domain::forum::{CHILD_LEVEL, ROOT_LEVEL},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    title: String,
    level: i16,
    parent_id: Option<i64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            level: row.level,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: i64,
    title: String,
    category_id: i64,
    user_id: Option<i64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ThreadRow> for ThreadRecord {
    fn from(row: ThreadRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            category_id: row.category_id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HomepageRow {
    root_id: i64,
    root_title: String,
    child_id: Option<i64>,
    child_title: Option<String>,
    child_updated_at: Option<OffsetDateTime>,
    thread_count: i64,
}

#[async_trait]
impl ForumRepo for PostgresRepositories {
    async fn find_thread(&self, id: i64) -> Result<Option<ThreadRecord>, RepoError> {
        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, title, category_id, user_id, created_at, updated_at
            FROM threads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ThreadRecord::from))
    }

    async fn list_threads_by_ids(&self, ids: &[i64]) -> Result<Vec<ThreadRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, title, category_id, user_id, created_at, updated_at
            FROM threads
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ThreadRecord::from).collect())
    }

    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, level, parent_id, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (title, level, parent_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, level, parent_id, created_at, updated_at
            "#,
        )
        .bind(&params.title)
        .bind(params.level)
        .bind(params.parent_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            INSERT INTO threads (title, category_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, category_id, user_id, created_at, updated_at
            "#,
        )
        .bind(&params.title)
        .bind(params.category_id)
        .bind(params.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // The homepage orders children by recent activity.
        sqlx::query("UPDATE categories SET updated_at = $2 WHERE id = $1")
            .bind(params.category_id)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn load_homepage(&self) -> Result<Vec<HomepageSection>, RepoError> {
        let rows = sqlx::query_as::<_, HomepageRow>(
            r#"
            SELECT
                root.id AS root_id,
                root.title AS root_title,
                child.id AS child_id,
                child.title AS child_title,
                child.updated_at AS child_updated_at,
                COUNT(t.id) AS thread_count
            FROM categories root
            LEFT JOIN categories child
                ON child.parent_id = root.id AND child.level = $2
            LEFT JOIN threads t ON t.category_id = child.id
            WHERE root.level = $1
            GROUP BY root.id, root.title, child.id, child.title, child.updated_at
            ORDER BY root.id, child.id
            "#,
        )
        .bind(ROOT_LEVEL)
        .bind(CHILD_LEVEL)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut sections: BTreeMap<i64, HomepageSection> = BTreeMap::new();
        for row in rows {
            let section = sections
                .entry(row.root_id)
                .or_insert_with(|| HomepageSection {
                    id: row.root_id,
                    title: row.root_title.clone(),
                    children: Vec::new(),
                });

            if let (Some(id), Some(title), Some(updated_at)) =
                (row.child_id, row.child_title, row.child_updated_at)
            {
                section.children.push(HomepageCategory {
                    id,
                    title,
                    thread_count: row.thread_count,
                    updated_at,
                });
            }
        }

        Ok(sections.into_values().collect())
    }
}
