//! Market-data provider trait and transport error types.
//!
//! The `DataProvider` trait abstracts over data sources (Yahoo Finance, the
//! in-memory replay provider) so pipelines can swap implementations and tests
//! can run without network access.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::MonthlyBar;

/// Transport-level errors from a data provider.
///
/// The fetcher folds these into `EngineError::FetchFailure` for the affected
/// ticker-year; they never escape a batch.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for {symbol} between {start} and {end}")]
    EmptyResult {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch monthly bars for `symbol` whose dates fall in `[start, end]`,
    /// oldest first.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<MonthlyBar>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait FetchProgress: Send + Sync {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(&self, symbol: &str, index: usize, total: usize, error: Option<&DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress through `tracing` events.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::debug!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, error: Option<&DataError>) {
        match error {
            None => tracing::info!(symbol, "downloaded"),
            Some(e) => tracing::warn!(symbol, error = %e, "fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "batch complete");
    }
}

/// Discards all progress events.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _error: Option<&DataError>) {}

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
