//! The concurrent fetch-and-persist pipeline
//!
//! A fixed pool of workers drains a queue of movies, resolves each cover
//! through the retry policy, and hands every completion to a single fan-in
//! loop. That loop is the only owner of the CSV sink and the progress
//! tracker, so no write ever needs a lock.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use super::progress::{ProgressTracker, format_eta};
use super::retry::{CoverResolver, CoverResult};
use super::sink::CsvSink;
use super::tmdb::CoverLookup;
use crate::db::MovieRecord;

/// Progress line cadence, in completions.
const PROGRESS_EVERY: usize = 100;

/// Terminal accounting for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub total: usize,
    pub processed: usize,
    pub found: usize,
}

/// Run the pipeline over `movies` with a pool of `concurrency` workers.
///
/// Every movie yields exactly one completion, in whatever order the network
/// delivers them. Rows are appended only for resolved covers; the sink is
/// flushed and closed before returning. One movie's exhausted retries never
/// block the rest of the pool.
pub async fn fetch_covers<L>(
    movies: Vec<MovieRecord>,
    resolver: Arc<CoverResolver<L>>,
    mut sink: CsvSink,
    concurrency: usize,
) -> Result<FetchSummary>
where
    L: CoverLookup + 'static,
{
    let total = movies.len();
    let concurrency = concurrency.max(1);
    let mut progress = ProgressTracker::new(total);

    // Work queue: preloaded up front, then closed. The fixed pool width is
    // the only admission control on outstanding requests.
    let (job_tx, job_rx) = flume::unbounded::<MovieRecord>();
    for movie in movies {
        // receivers are alive until the workers finish
        let _ = job_tx.send(movie);
    }
    drop(job_tx);

    let (result_tx, result_rx) = flume::bounded::<CoverResult>(concurrency);

    let mut workers = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let resolver = resolver.clone();
        workers.push(tokio::spawn(async move {
            while let Ok(movie) = job_rx.recv_async().await {
                let result = resolver.resolve(movie.movie_id, &movie.title).await;
                if result_tx.send_async(result).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(job_rx);
    drop(result_tx);

    // Fan-in: the result channel closes once the last worker exits.
    while let Ok(result) = result_rx.recv_async().await {
        if let Some(url) = &result.cover_url {
            sink.record(result.movie_id, url)?;
        }
        progress.observe(&result);

        if progress.processed() % PROGRESS_EVERY == 0 {
            let snapshot = progress.snapshot();
            info!(
                processed = snapshot.processed,
                total = snapshot.total,
                found = snapshot.found,
                rate = %format!("{:.1}/s", snapshot.rate),
                eta = %format_eta(snapshot.eta),
                "Progress"
            );
        }
    }

    for worker in workers {
        // a panicked worker has already given up its share of the queue
        let _ = worker.await;
    }

    debug!(rows = sink.rows_written(), "Completion stream drained");
    sink.close()?;

    Ok(FetchSummary {
        total,
        processed: progress.processed(),
        found: progress.found(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::services::retry::RetryConfig;
    use crate::services::tmdb::LookupOutcome;

    /// Lookup that replays per-title outcome scripts, falling back to a
    /// fixed outcome once a script is drained.
    #[derive(Clone)]
    struct ScriptedLookup {
        scripts: Arc<Mutex<HashMap<String, VecDeque<LookupOutcome>>>>,
        fallback: LookupOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedLookup {
        fn new(fallback: LookupOutcome) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(HashMap::new())),
                fallback,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn script(self, title: &str, outcomes: Vec<LookupOutcome>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(title.to_string(), outcomes.into());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CoverLookup for ScriptedLookup {
        async fn lookup(&self, title: &str) -> LookupOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scripts
                .lock()
                .unwrap()
                .get_mut(title)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn movie(id: i64, title: &str) -> MovieRecord {
        MovieRecord {
            movie_id: id,
            title: title.to_string(),
        }
    }

    fn found(url: &str) -> LookupOutcome {
        LookupOutcome::Found(url.to_string())
    }

    fn resolver(lookup: ScriptedLookup) -> Arc<CoverResolver<ScriptedLookup>> {
        Arc::new(CoverResolver::new(lookup, RetryConfig::default()))
    }

    fn read_rows(path: &Path) -> Vec<(i64, String)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|record| {
                let record = record.unwrap();
                assert_eq!(record.len(), 2, "row must have exactly two fields");
                (record[0].parse().unwrap(), record[1].to_string())
            })
            .collect()
    }

    #[tokio::test]
    async fn mixed_outcomes_write_only_resolved_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let lookup = ScriptedLookup::new(LookupOutcome::NotFound)
            .script("Heat", vec![found("https://img/heat.jpg")])
            .script("Alien", vec![found("https://img/alien.jpg")])
            .script("Obscure", vec![LookupOutcome::NotFound]);
        let movies = vec![movie(1, "Heat"), movie(2, "Alien"), movie(3, "Obscure")];

        let summary = fetch_covers(movies, resolver(lookup), CsvSink::create(&path).unwrap(), 4)
            .await
            .unwrap();

        assert_eq!(
            summary,
            FetchSummary {
                total: 3,
                processed: 3,
                found: 2
            }
        );

        let mut rows = read_rows(&path);
        rows.sort();
        assert_eq!(
            rows,
            vec![
                (1, "https://img/heat.jpg".to_string()),
                (2, "https://img/alien.jpg".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_then_found_takes_three_calls_and_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let lookup = ScriptedLookup::new(LookupOutcome::NotFound).script(
            "Popular",
            vec![
                LookupOutcome::RateLimited(None),
                LookupOutcome::RateLimited(None),
                found("https://img/popular.jpg"),
            ],
        );

        let summary = fetch_covers(
            vec![movie(9, "Popular")],
            resolver(lookup.clone()),
            CsvSink::create(&path).unwrap(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(lookup.calls(), 3);
        assert_eq!(summary.found, 1);
        assert_eq!(read_rows(&path), vec![(9, "https://img/popular.jpg".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_completes_cleanly_with_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let lookup = ScriptedLookup::new(LookupOutcome::TransientError);

        let summary = fetch_covers(
            vec![movie(5, "Flaky")],
            resolver(lookup.clone()),
            CsvSink::create(&path).unwrap(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(lookup.calls(), 3);
        assert_eq!(
            summary,
            FetchSummary {
                total: 1,
                processed: 1,
                found: 0
            }
        );
        assert_eq!(read_rows(&path), vec![]);
    }

    #[tokio::test]
    async fn every_movie_yields_exactly_one_result_at_any_pool_width() {
        for concurrency in [1, 8] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("covers.csv");

            let lookup = ScriptedLookup::new(found("https://img/x.jpg"));
            let movies: Vec<_> = (0..25).map(|id| movie(id, &format!("Movie {id}"))).collect();

            let summary = fetch_covers(
                movies,
                resolver(lookup),
                CsvSink::create(&path).unwrap(),
                concurrency,
            )
            .await
            .unwrap();

            assert_eq!(summary.processed, 25, "width {concurrency}");
            assert_eq!(summary.found, 25, "width {concurrency}");

            let mut ids: Vec<i64> = read_rows(&path).into_iter().map(|(id, _)| id).collect();
            ids.sort();
            assert_eq!(ids, (0..25).collect::<Vec<i64>>(), "width {concurrency}");
        }
    }

    #[tokio::test]
    async fn concurrent_completions_never_corrupt_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        // half the movies resolve, half do not
        let lookup = ScriptedLookup::new(LookupOutcome::NotFound);
        let movies: Vec<_> = (0..40)
            .map(|id| {
                let title = format!("Movie {id}");
                if id % 2 == 0 {
                    lookup
                        .scripts
                        .lock()
                        .unwrap()
                        .insert(title.clone(), vec![found(&format!("https://img/{id}.jpg"))].into());
                }
                movie(id, &title)
            })
            .collect();

        let summary = fetch_covers(movies, resolver(lookup), CsvSink::create(&path).unwrap(), 8)
            .await
            .unwrap();

        assert_eq!(summary.processed, 40);
        assert_eq!(summary.found, 20);

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 20);
        for (id, url) in rows {
            assert_eq!(url, format!("https://img/{id}.jpg"));
        }
    }

    #[tokio::test]
    async fn empty_source_is_a_valid_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let lookup = ScriptedLookup::new(LookupOutcome::NotFound);
        let summary = fetch_covers(vec![], resolver(lookup), CsvSink::create(&path).unwrap(), 4)
            .await
            .unwrap();

        assert_eq!(
            summary,
            FetchSummary {
                total: 0,
                processed: 0,
                found: 0
            }
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn duplicate_ids_produce_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let lookup = ScriptedLookup::new(found("https://img/dup.jpg"));
        let movies = vec![movie(1, "Twin"), movie(1, "Twin")];

        let summary = fetch_covers(movies, resolver(lookup), CsvSink::create(&path).unwrap(), 2)
            .await
            .unwrap();

        assert_eq!(summary.found, 2);
        assert_eq!(read_rows(&path).len(), 2);
    }
}
