//! History provider trait and structured error types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// One monthly bar. `date` is the first trading day the provider reports for the month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

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

    #[error("provider is refusing requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("history store {path}: {message}")]
    Store { path: String, message: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Source of monthly bars. Implementations know nothing about the local store.
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Monthly bars for `symbol` between `start` and `end`, oldest first.
    fn fetch_monthly(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthlyBar>, DataError>;

    /// False while the provider is blocked or rate limited.
    fn is_available(&self) -> bool;
}

/// Callbacks for multi-ticker retrieval.
pub trait FetchProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize);
    fn on_complete(&self, ticker: &str, result: &Result<usize, DataError>);
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reported through `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        info!(ticker, position = index + 1, total, "fetching monthly history");
    }

    fn on_complete(&self, ticker: &str, result: &Result<usize, DataError>) {
        match result {
            Ok(bars) => info!(ticker, bars, "history fetched"),
            Err(e) => warn!(ticker, error = %e, "history fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "history retrieval complete");
    }
}
