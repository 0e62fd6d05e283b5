//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Everything a fetch run needs, loaded once at startup and passed into the
/// pipeline at construction
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog database URL (MySQL)
    pub database_url: String,

    /// TMDB API key
    pub api_key: String,

    /// TMDB movie search endpoint
    pub search_endpoint: String,

    /// Base URL poster paths are resolved against
    pub image_base_url: String,

    /// Output CSV path
    pub output_path: PathBuf,

    /// Worker pool width
    pub concurrency: usize,

    /// Lookup attempts per movie before giving up
    pub max_attempts: u32,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// First retry delay; doubles on every failed attempt
    pub initial_backoff: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,

            api_key: env::var("TMDB_API_KEY").context("TMDB_API_KEY is required")?,

            search_endpoint: env::var("TMDB_SEARCH_ENDPOINT")
                .unwrap_or_else(|_| "https://api.themoviedb.org/3/search/movie".to_string()),

            image_base_url: env::var("TMDB_IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://image.tmdb.org/t/p/w500".to_string()),

            output_path: env::var("OUTPUT_PATH")
                .unwrap_or_else(|_| "movie_covers.csv".to_string())
                .into(),

            concurrency: env::var("FETCH_CONCURRENCY")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("Invalid FETCH_CONCURRENCY")?,

            max_attempts: 3,

            request_timeout: Duration::from_secs(10),

            initial_backoff: Duration::from_secs(1),
        })
    }
}
