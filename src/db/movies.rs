//! Movie repository: the entity source for a fetch run

use anyhow::{Context, Result};
use sqlx::MySqlPool;
use tracing::debug;

/// Movie row as the pipeline sees it
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub title: String,
}

pub struct MovieRepository {
    pool: MySqlPool,
}

impl MovieRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Fetch the full movie list, fully materialized. The pipeline treats
    /// it as an immutable sequence for the duration of the run.
    pub async fn fetch_all(&self) -> Result<Vec<MovieRecord>> {
        let movies = sqlx::query_as::<_, MovieRecord>(
            "SELECT movieId AS movie_id, title FROM Movies",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch movies from the catalog")?;

        debug!(count = movies.len(), "Loaded movie list");
        Ok(movies)
    }
}
