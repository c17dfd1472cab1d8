//! Graph store over an adjacency table.
//!
//! Threads are connected to their structural neighbours (tags by name,
//! categories by id). Similarity is the number of neighbours two threads
//! share, computed with a self-join over `graph_edges`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::{
    application::repos::{GraphRepo, RepoError},
    domain::entities::{GraphNeighbor, SimilarityEdge},
};

use super::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct SharedRow {
    thread_id: i64,
    shared_count: i64,
}

/// Graph adapter holding its own pool so it can live in a separate database.
#[derive(Clone)]
pub struct PostgresGraph {
    pool: Arc<PgPool>,
}

impl PostgresGraph {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the adjacency schema. Safe to run against the relational
    /// database when the graph shares it.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut migrator = sqlx::migrate!("./graph_migrations");
        migrator.set_ignore_missing(true);
        migrator.run(pool).await.map_err(Into::into)
    }
}

#[async_trait]
impl GraphRepo for PostgresGraph {
    async fn merge_thread(
        &self,
        thread_id: i64,
        neighbors: &[GraphNeighbor],
    ) -> Result<(), RepoError> {
        if neighbors.is_empty() {
            return Ok(());
        }

        let (kinds, keys): (Vec<&str>, Vec<&str>) = neighbors
            .iter()
            .map(|neighbor| (neighbor.kind.as_str(), neighbor.key.as_str()))
            .unzip();

        sqlx::query(
            r#"
            INSERT INTO graph_edges (thread_id, neighbor_kind, neighbor_key)
            SELECT $1, n.kind, n.key
            FROM UNNEST($2::TEXT[], $3::TEXT[]) AS n(kind, key)
            ON CONFLICT (thread_id, neighbor_kind, neighbor_key) DO NOTHING
            "#,
        )
        .bind(thread_id)
        .bind(&kinds)
        .bind(&keys)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn shared_neighbor_counts(
        &self,
        thread_id: i64,
    ) -> Result<Vec<SimilarityEdge>, RepoError> {
        let rows = sqlx::query_as::<_, SharedRow>(
            r#"
            SELECT other.thread_id, COUNT(*) AS shared_count
            FROM graph_edges src
            INNER JOIN graph_edges other
                ON other.neighbor_kind = src.neighbor_kind
               AND other.neighbor_key = src.neighbor_key
               AND other.thread_id <> src.thread_id
            WHERE src.thread_id = $1
            GROUP BY other.thread_id
            ORDER BY shared_count DESC, other.thread_id ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SimilarityEdge {
                thread_id: row.thread_id,
                shared_count: row.shared_count,
            })
            .collect())
    }
}
