//! Catalog database connection and repositories

pub mod movies;

use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

pub use movies::{MovieRecord, MovieRepository};

/// Connection handle to the FilmCatalog store
#[derive(Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    /// Connect to the catalog database. The movie list is the run's only
    /// input, so a failure here aborts before any worker starts.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .context("Failed to connect to the catalog database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}
