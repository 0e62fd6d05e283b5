//! CSV sink for resolved covers
//!
//! The output feeds a later bulk-load into the catalog, so rows are bare
//! `movie_id,cover_url` pairs with no header. Movies without a cover are
//! simply absent.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Durability flush cadence, in persisted rows. An abrupt kill loses at
/// most one flush window.
const FLUSH_EVERY: u64 = 50;

/// Append-only CSV target, owned by the single fan-in consumer so writes
/// never interleave.
pub struct CsvSink {
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl CsvSink {
    /// Create (truncating) the output file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;

        Ok(Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
            rows_written: 0,
        })
    }

    /// Append one resolved cover row.
    pub fn record(&mut self, movie_id: i64, cover_url: &str) -> Result<()> {
        self.writer
            .write_record([movie_id.to_string().as_str(), cover_url])
            .context("Failed to write cover row")?;

        self.rows_written += 1;
        if self.rows_written % FLUSH_EVERY == 0 {
            self.writer.flush().context("Failed to flush output file")?;
            debug!(rows = self.rows_written, "Flushed cover rows to disk");
        }
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Final flush and release of the file handle.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush output file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_bare_rows_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.record(42, "https://image.tmdb.org/t/p/w500/a.jpg").unwrap();
        sink.record(7, "https://image.tmdb.org/t/p/w500/b.jpg").unwrap();
        assert_eq!(sink.rows_written(), 2);
        sink.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "42,https://image.tmdb.org/t/p/w500/a.jpg\n7,https://image.tmdb.org/t/p/w500/b.jpg\n"
        );
    }

    #[test]
    fn close_flushes_rows_below_the_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        for id in 0..7 {
            sink.record(id, "https://img/x.jpg").unwrap();
        }
        sink.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 7);
    }

    #[test]
    fn empty_run_leaves_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers.csv");

        let sink = CsvSink::create(&path).unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
