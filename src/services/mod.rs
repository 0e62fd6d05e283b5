//! Cover fetch pipeline components

pub mod covers;
pub mod progress;
pub mod retry;
pub mod sink;
pub mod tmdb;

pub use covers::{FetchSummary, fetch_covers};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use retry::{CoverResolver, CoverResult, RetryConfig};
pub use sink::CsvSink;
pub use tmdb::{CoverLookup, LookupOutcome, TmdbClient};
