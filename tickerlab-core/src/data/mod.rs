//! Monthly price history: provider abstraction, Yahoo client, local store, trailing returns.

pub mod circuit_breaker;
pub mod history;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use history::{
    provider_symbol, retrieve_history, run_history, tickers_from_snapshot, top_performers,
    trailing_returns, write_performers, HistoryReport, HistoryRow, HistoryStore, HistorySummary,
    TrailingWindow, PERFORMERS_FILE, STORE_FILE,
};
pub use provider::{DataError, FetchProgress, HistoryProvider, LogProgress, MonthlyBar};
pub use yahoo::YahooProvider;
