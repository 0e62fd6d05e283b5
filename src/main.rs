//! coverfetch - bulk cover-art fetcher for the FilmCatalog database
//!
//! Reads the movie list from the catalog store, resolves a poster URL for
//! each title through the TMDB search API, and appends the results to a CSV
//! file consumed by the bulk-load step.

mod cli;
mod config;
mod db;
mod services;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::CliOptions;
use crate::config::Config;
use crate::db::{Database, MovieRepository};
use crate::services::{CoverResolver, CsvSink, RetryConfig, TmdbClient, fetch_covers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let options = CliOptions::from_args();
    let mut config = Config::from_env()?;
    if let Some(concurrency) = options.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(output) = options.output {
        config.output_path = output;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coverfetch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(concurrency = config.concurrency, "Starting cover fetch");

    // Entity source failure is fatal: no workers, no output file.
    let db = Database::connect(&config.database_url).await?;
    let movies = MovieRepository::new(db.pool().clone()).fetch_all().await?;
    tracing::info!(count = movies.len(), "Loaded movie list from catalog");

    let client = TmdbClient::new(&config)?;
    let resolver = Arc::new(CoverResolver::new(
        client,
        RetryConfig {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            ..RetryConfig::default()
        },
    ));
    let sink = CsvSink::create(&config.output_path)?;

    let summary = fetch_covers(movies, resolver, sink, config.concurrency).await?;

    let output = config
        .output_path
        .canonicalize()
        .unwrap_or_else(|_| config.output_path.clone());
    tracing::info!(
        found = summary.found,
        total = summary.total,
        output = %output.display(),
        "Cover fetch complete"
    );
    tracing::info!("Next step: bulk-load the CSV into the catalog");

    Ok(())
}
