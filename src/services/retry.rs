//! Retry policy for cover lookups
//!
//! Wraps a single flaky search call in bounded exponential backoff so the
//! dispatcher sees exactly one definitive result per movie. A movie that
//! exhausts its attempt budget simply has no cover; that is data, not an
//! error.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::{debug, warn};

use super::tmdb::{CoverLookup, LookupOutcome};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of lookup attempts per movie
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create an ExponentialBackoff from this config.
    ///
    /// Randomization is disabled so the schedule is exact, and the interval
    /// is effectively uncapped: the attempt budget bounds worst-case
    /// latency, not a ceiling.
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            multiplier: self.multiplier,
            randomization_factor: 0.0,
            max_interval: Duration::from_secs(3600),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// The unit flowing out of the dispatcher: a movie and its resolved cover,
/// if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverResult {
    pub movie_id: i64,
    pub cover_url: Option<String>,
}

/// Drives a lookup to a definitive per-movie result
pub struct CoverResolver<L> {
    lookup: L,
    config: RetryConfig,
}

impl<L: CoverLookup> CoverResolver<L> {
    pub fn new(lookup: L, config: RetryConfig) -> Self {
        Self { lookup, config }
    }

    /// Resolve a cover URL for one movie.
    ///
    /// `Found` and `NotFound` end the loop immediately; 429 and transport
    /// errors sleep and retry until the attempt budget runs out. The
    /// exponential state advances on every failed attempt; a Retry-After
    /// hint only overrides the sleep itself.
    pub async fn resolve(&self, movie_id: i64, title: &str) -> CoverResult {
        let mut backoff = self.config.to_backoff();

        for attempt in 1..=self.config.max_attempts {
            match self.lookup.lookup(title).await {
                LookupOutcome::Found(url) => {
                    return CoverResult {
                        movie_id,
                        cover_url: Some(url),
                    };
                }
                LookupOutcome::NotFound => {
                    debug!(movie_id, title = %title, "No cover for movie");
                    return CoverResult {
                        movie_id,
                        cover_url: None,
                    };
                }
                LookupOutcome::RateLimited(hint) => {
                    let interval = backoff
                        .next_backoff()
                        .unwrap_or(self.config.initial_backoff);
                    let delay = hint.unwrap_or(interval);
                    if attempt < self.config.max_attempts {
                        warn!(
                            movie_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                LookupOutcome::TransientError => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.initial_backoff);
                    if attempt < self.config.max_attempts {
                        warn!(
                            movie_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Lookup attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        debug!(movie_id, title = %title, "Retry budget exhausted without a cover");
        CoverResult {
            movie_id,
            cover_url: None,
        }
    }
}
