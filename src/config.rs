//! Cataloger configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Cataloger configuration options.
#[derive(Debug, Clone)]
pub struct CatalogerConfig {
    /// Path to the SQLite database file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Create the database file if it doesn't exist.
    pub create_if_missing: bool,
    /// How long a writer waits on a lock held by another connection.
    pub busy_timeout: Duration,
    /// Upper bound (and default) for the number of results a listing returns.
    pub list_max_limit: usize,
    /// Rows fetched per layer and per round trip while merging a listing.
    pub list_page_size: usize,
    /// SQLite VM steps between cancellation probes.
    pub progress_ops: i32,
}

impl Default for CatalogerConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
            list_max_limit: 10_000,
            list_page_size: 1_000,
            progress_ops: 1_000,
        }
    }
}

impl CatalogerConfig {
    /// Create a new configuration backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create a configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, value: Duration) -> Self {
        self.busy_timeout = value;
        self
    }

    /// Set the listing limit cap. Zero is bumped to one.
    pub fn list_max_limit(mut self, value: usize) -> Self {
        self.list_max_limit = value.max(1);
        self
    }

    /// Set the listing page size. Zero is bumped to one.
    pub fn list_page_size(mut self, value: usize) -> Self {
        self.list_page_size = value.max(1);
        self
    }

    /// Set how often SQLite checks for cancellation.
    pub fn progress_ops(mut self, value: i32) -> Self {
        self.progress_ops = value.max(1);
        self
    }

    /// Clamp a requested listing limit to the configured cap.
    pub(crate) fn effective_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.list_max_limit),
            _ => self.list_max_limit,
        }
    }
}
