//! Monthly history retrieval, persistence and trailing 12-month performance.
//!
//! Fetched bars are persisted in `monthly_history.csv` as
//! `ticker,date,open,close,fetched_on`. A store whose newest row was fetched
//! today is up to date and no request goes out unless forced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use super::provider::{DataError, FetchProgress, HistoryProvider, LogProgress, MonthlyBar};
use crate::config::PipelineConfig;
use crate::files::{self, LatestBy};
use crate::schema::SYMBOL;

pub const STORE_FILE: &str = "monthly_history.csv";
pub const PERFORMERS_FILE: &str = "top_performers_all_periods.csv";

/// Bars in one trailing window: the reference close plus eleven more months.
const WINDOW_LEN: usize = 12;

/// One persisted monthly bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub fetched_on: NaiveDate,
}

/// CSV-backed store of monthly bars.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl ToString) -> DataError {
        DataError::Store {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// All persisted rows. A missing store is empty.
    pub fn load(&self) -> Result<Vec<HistoryRow>, DataError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.error(e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<HistoryRow>, _>>()
            .map_err(|e| self.error(e))
    }

    /// Replace the store contents.
    pub fn save(&self, rows: &[HistoryRow]) -> Result<(), DataError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp).map_err(|e| self.error(e))?;
            for row in rows {
                writer.serialize(row).map_err(|e| self.error(e))?;
            }
            writer.flush().map_err(|e| self.error(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.error(e))
    }

    pub fn is_up_to_date(&self, today: NaiveDate) -> Result<bool, DataError> {
        let newest = self.load()?.iter().map(|r| r.fetched_on).max();
        Ok(newest == Some(today))
    }
}

/// Provider symbol of an exchange-qualified ticker: `NASDAQ:AAPL` -> `AAPL`.
pub fn provider_symbol(ticker: &str) -> &str {
    ticker.rsplit(':').next().unwrap_or(ticker).trim()
}

/// Outcome of one retrieval batch.
#[derive(Debug, Default)]
pub struct HistorySummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
    /// The store was already current and nothing was fetched.
    pub up_to_date: bool,
}

impl HistorySummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Fetch `months` of monthly bars for every ticker and merge them into `store`.
///
/// Tickers fail independently. Once the provider stops being available every
/// remaining ticker is marked failed without a request. Only store I/O is fatal.
pub fn retrieve_history(
    provider: &dyn HistoryProvider,
    store: &HistoryStore,
    tickers: &[String],
    months: u32,
    today: NaiveDate,
    force: bool,
    progress: &dyn FetchProgress,
) -> Result<HistorySummary, DataError> {
    let total = tickers.len();
    if !force && store.is_up_to_date(today)? {
        info!(store = %store.path().display(), "history already fetched today, skipping download");
        return Ok(HistorySummary {
            total,
            up_to_date: true,
            ..HistorySummary::default()
        });
    }

    let start = today.checked_sub_months(Months::new(months)).unwrap_or(today);
    let mut summary = HistorySummary {
        total,
        ..HistorySummary::default()
    };
    let mut fetched: BTreeMap<&str, Vec<MonthlyBar>> = BTreeMap::new();

    for (i, ticker) in tickers.iter().enumerate() {
        progress.on_start(ticker, i, total);
        let result = provider.fetch_monthly(provider_symbol(ticker), start, today);
        let outcome = result.as_ref().map(Vec::len).map_err(clone_for_progress);
        progress.on_complete(ticker, &outcome);

        match result {
            Ok(bars) => {
                summary.succeeded += 1;
                fetched.insert(ticker.as_str(), bars);
            }
            Err(e) => {
                summary.failed += 1;
                summary.errors.push((ticker.clone(), e));
            }
        }

        if !provider.is_available() {
            for rest in &tickers[i + 1..] {
                summary.failed += 1;
                summary.errors.push((rest.clone(), DataError::CircuitBreakerTripped));
            }
            warn!(remaining = total - i - 1, "provider unavailable, abandoning batch");
            break;
        }
    }
    progress.on_batch_complete(summary.succeeded, summary.failed, total);

    if !fetched.is_empty() {
        let mut rows: Vec<HistoryRow> = store
            .load()?
            .into_iter()
            .filter(|row| !fetched.contains_key(row.ticker.as_str()))
            .collect();
        for (ticker, bars) in &fetched {
            rows.extend(bars.iter().map(|bar| HistoryRow {
                ticker: ticker.to_string(),
                date: bar.date,
                open: bar.open,
                close: bar.close,
                fetched_on: today,
            }));
        }
        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));
        store.save(&rows)?;
        info!(rows = rows.len(), store = %store.path().display(), "history store updated");
    }

    Ok(summary)
}

// DataError is not Clone; progress only needs the message.
fn clone_for_progress(e: &DataError) -> DataError {
    match e {
        DataError::CircuitBreakerTripped => DataError::CircuitBreakerTripped,
        other => DataError::Other(other.to_string()),
    }
}

/// Performance over one 12-month window of a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingWindow {
    pub ticker: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub perf_12m: f64,
    pub perf_6m: f64,
    pub perf_3m: f64,
    pub score_total: f64,
}

/// Every complete 12-month window of `bars`, oldest first.
///
/// The window ending at bar `e` measures the close of `e` against the closes
/// 11, 5 and 2 bars earlier. A window must cover 12 consecutive calendar
/// months, so one that spans a missing month is dropped, as is one with a
/// non-positive price.
pub fn trailing_returns(ticker: &str, bars: &[MonthlyBar]) -> Vec<TrailingWindow> {
    let mut bars = bars.to_vec();
    bars.sort_by_key(|b| b.date);

    bars.windows(WINDOW_LEN)
        .filter_map(|w| {
            let (first, end) = (w[0], w[WINDOW_LEN - 1]);
            if month_index(end.date) - month_index(first.date) != WINDOW_LEN as i32 - 1 {
                return None;
            }
            let (six, three) = (w[6].close, w[9].close);
            if [first.close, six, three, end.close].iter().any(|&p| p <= 0.0 || !p.is_finite()) {
                return None;
            }
            let pct = |from: f64| (end.close - from) / from * 100.0;
            let (perf_12m, perf_6m, perf_3m) = (pct(first.close), pct(six), pct(three));
            Some(TrailingWindow {
                ticker: ticker.to_string(),
                period_start: first.date,
                period_end: end.date,
                perf_12m,
                perf_6m,
                perf_3m,
                score_total: perf_12m + perf_6m + perf_3m,
            })
        })
        .collect()
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Best windows of one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodLeaders {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub leaders: Vec<TrailingWindow>,
}

/// Top `n` windows by `score_total` for every period, newest period first.
pub fn top_performers(windows: &[TrailingWindow], n: usize) -> Vec<PeriodLeaders> {
    let mut periods: BTreeMap<(NaiveDate, NaiveDate), Vec<TrailingWindow>> = BTreeMap::new();
    for w in windows {
        periods
            .entry((w.period_end, w.period_start))
            .or_default()
            .push(w.clone());
    }

    periods
        .into_iter()
        .rev()
        .map(|((period_end, period_start), mut leaders)| {
            leaders.sort_by(|a, b| b.score_total.total_cmp(&a.score_total));
            leaders.truncate(n);
            PeriodLeaders {
                period_start,
                period_end,
                leaders,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct PerformerRecord<'a> {
    period_start: NaiveDate,
    period_end: NaiveDate,
    rank: usize,
    ticker: &'a str,
    perf_12m_pct: f64,
    perf_6m_pct: f64,
    perf_3m_pct: f64,
    score_total: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Write the per-period leaders as CSV.
pub fn write_performers(path: &Path, periods: &[PeriodLeaders]) -> Result<(), DataError> {
    let err = |e: csv::Error| DataError::Store {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(err)?;
    for period in periods {
        for (i, w) in period.leaders.iter().enumerate() {
            writer
                .serialize(PerformerRecord {
                    period_start: period.period_start,
                    period_end: period.period_end,
                    rank: i + 1,
                    ticker: &w.ticker,
                    perf_12m_pct: round2(w.perf_12m),
                    perf_6m_pct: round2(w.perf_6m),
                    perf_3m_pct: round2(w.perf_3m),
                    score_total: round2(w.score_total),
                })
                .map_err(err)?;
        }
    }
    writer.flush().map_err(|e| DataError::Store {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Tickers from the first column of the most recent snapshot in `dir`.
pub fn tickers_from_snapshot(dir: &Path, pattern: &str) -> Result<Vec<String>, DataError> {
    let matcher = files::matcher(pattern).map_err(|e| DataError::Other(e.to_string()))?;
    let candidates = files::list_matching(dir, &matcher).map_err(|e| DataError::Store {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    let source = files::latest(&candidates, LatestBy::FilenameDate).ok_or_else(|| {
        DataError::Other(format!("no snapshot matching '{pattern}' in {}", dir.display()))
    })?;

    let err = |e: csv::Error| DataError::Store {
        path: source.display().to_string(),
        message: e.to_string(),
    };
    let mut reader = csv::Reader::from_path(&source).map_err(err)?;
    let first = reader.headers().map_err(err)?.get(0).unwrap_or_default().to_string();
    if first != SYMBOL {
        warn!(
            file = %source.display(),
            column = %first,
            expected = SYMBOL,
            "unexpected first column, using it anyway"
        );
    }

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(err)?;
        match record.get(0).map(str::trim) {
            Some(t) if !t.is_empty() => tickers.push(t.to_string()),
            _ => {}
        }
    }
    info!(file = %source.display(), tickers = tickers.len(), "loaded tickers from snapshot");
    Ok(tickers)
}

/// What one history run produced.
#[derive(Debug)]
pub struct HistoryReport {
    pub summary: HistorySummary,
    pub windows: usize,
    pub performers: PathBuf,
}

/// The history stage: resolve tickers, refresh the store, rank trailing windows.
pub fn run_history(
    config: &PipelineConfig,
    provider: &dyn HistoryProvider,
    tickers: Option<Vec<String>>,
    today: NaiveDate,
    force: bool,
) -> Result<HistoryReport, DataError> {
    let dir = &config.directories.history;
    let _span = info_span!("history", provider = provider.name()).entered();

    let tickers = match tickers {
        Some(t) if !t.is_empty() => t,
        _ => tickers_from_snapshot(dir, &config.files.snapshot_pattern)?,
    };

    let store = HistoryStore::new(dir);
    let summary = retrieve_history(
        provider,
        &store,
        &tickers,
        config.history.months,
        today,
        force,
        &LogProgress,
    )?;
    for (ticker, e) in &summary.errors {
        warn!(ticker = %ticker, error = %e, "no history");
    }

    let mut by_ticker: BTreeMap<String, Vec<MonthlyBar>> = BTreeMap::new();
    for row in store.load()? {
        by_ticker.entry(row.ticker).or_default().push(MonthlyBar {
            date: row.date,
            open: row.open,
            close: row.close,
        });
    }
    let windows: Vec<TrailingWindow> = by_ticker
        .iter()
        .flat_map(|(ticker, bars)| trailing_returns(ticker, bars))
        .collect();

    let periods = top_performers(&windows, config.history.top_per_period);
    let performers = dir.join(PERFORMERS_FILE);
    fs::create_dir_all(dir).map_err(|e| DataError::Store {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    write_performers(&performers, &periods)?;

    if let Some(latest) = periods.first() {
        let head: Vec<&str> = latest.leaders.iter().map(|w| w.ticker.as_str()).collect();
        info!(period_end = %latest.period_end, leaders = ?head, "latest period leaders");
    }
    info!(
        periods = periods.len(),
        windows = windows.len(),
        path = %performers.display(),
        "top performers written"
    );

    Ok(HistoryReport {
        summary,
        windows: windows.len(),
        performers,
    })
}
