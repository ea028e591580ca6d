//! Yahoo Finance monthly history over the v8 chart API.
//!
//! The endpoint is unofficial. 403 opens the circuit breaker at once, 429 and
//! other HTTP failures count towards it and are retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, HistoryProvider, MonthlyBar};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, max_retries: u32) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let period2 = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={period1}&period2={period2}&interval=1mo"
        )
    }

    fn parse_response(symbol: &str, body: &str) -> Result<Vec<MonthlyBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("unparseable chart for {symbol}: {e}"))
        })?;

        let Some(result) = resp.chart.result else {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                Some(err) => {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
                None => DataError::ResponseFormatChanged("empty result with no error".into()),
            });
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            // months without a close are gaps
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let open = quote.open.get(i).copied().flatten().unwrap_or(close);
            bars.push(MonthlyBar { date, open, close });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthlyBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
            let bars = Self::parse_response(symbol, &body)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_monthly(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthlyBar>, DataError> {
        self.fetch_with_retry(symbol, start, end)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
