//! TMDB (The Movie Database) API client for cover lookups
//!
//! Base URL: https://api.themoviedb.org/3
//!
//! One search request per title; the first result's poster path is the only
//! thing the pipeline cares about. Every attempt is classified into a
//! [`LookupOutcome`] so the retry policy can decide what to do next.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;

/// Outcome of a single search attempt, classified for the retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A cover resolved to a fully qualified image URL
    Found(String),
    /// The API answered definitively without a usable poster
    NotFound,
    /// HTTP 429, with the Retry-After hint when the API sent one
    RateLimited(Option<Duration>),
    /// Timeout, connection failure, bad body, or unexpected status
    TransientError,
}

/// One external search per title. Implementations hold no per-call state
/// and are safe to share across any number of workers.
#[async_trait]
pub trait CoverLookup: Send + Sync {
    async fn lookup(&self, title: &str) -> LookupOutcome;
}

/// Movie search result from TMDB (fields the pipeline does not use are
/// ignored by serde)
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    pub results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResult {
    pub poster_path: Option<String>,
}

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    api_key: String,
    search_endpoint: String,
    image_base_url: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            search_endpoint: config.search_endpoint.clone(),
            image_base_url: config.image_base_url.clone(),
        })
    }
}

#[async_trait]
impl CoverLookup for TmdbClient {
    async fn lookup(&self, title: &str) -> LookupOutcome {
        let response = match self
            .client
            .get(&self.search_endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", title),
                ("language", "en-US"),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(query = %title, error = %e, "TMDB request failed");
                return LookupOutcome::TransientError;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<TmdbSearchResponse>().await {
                Ok(body) => match poster_url(&self.image_base_url, &body) {
                    Some(url) => {
                        debug!(query = %title, url = %url, "TMDB search found a poster");
                        LookupOutcome::Found(url)
                    }
                    None => LookupOutcome::NotFound,
                },
                Err(e) => {
                    warn!(query = %title, error = %e, "Failed to parse TMDB search results");
                    LookupOutcome::TransientError
                }
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let hint = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after);
                LookupOutcome::RateLimited(hint)
            }
            status => {
                debug!(query = %title, status = %status, "TMDB search returned unexpected status");
                LookupOutcome::TransientError
            }
        }
    }
}

/// Assemble the cover URL from the first search result, if it carries a
/// poster path.
fn poster_url(image_base_url: &str, response: &TmdbSearchResponse) -> Option<String> {
    response
        .results
        .first()
        .and_then(|first| first.poster_path.as_deref())
        .filter(|path| !path.is_empty())
        .map(|path| format!("{image_base_url}{path}"))
}

/// Integer-seconds form of Retry-After; the HTTP-date form is treated as
/// absent and falls back to the exponential schedule.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
