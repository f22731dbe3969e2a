//! Yahoo Finance data provider.
//!
//! Fetches monthly bars from Yahoo's v8 chart API with bounded retries,
//! exponential backoff and the shared circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; response parsing fails with `ResponseFormatChanged` rather than
//! guessing.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider};
use crate::domain::MonthlyBar;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
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
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Tunables for the HTTP client.
#[derive(Debug, Clone)]
pub struct YahooOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    options: YahooOptions,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, options: YahooOptions) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            options,
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        let symbol = symbol.replace('^', "%5E");
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1mo\
             &includeAdjustedClose=true"
        )
    }

    /// Parse a chart API body into bars dated within `[start, end]`.
    fn parse_response(
        symbol: &str,
        body: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthlyBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // Yahoo omits `timestamp` entirely when the window holds no bars.
        let timestamps = data.timestamp.unwrap_or_default();

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            if date < start || date > end {
                continue;
            }

            let close = quote.close.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
            if close.is_none() && adj_close.is_none() {
                continue;
            }

            bars.push(MonthlyBar {
                date,
                open: quote.open.get(i).copied().flatten().unwrap_or(f64::NAN),
                high: quote.high.get(i).copied().flatten().unwrap_or(f64::NAN),
                low: quote.low.get(i).copied().flatten().unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                adj_close: adj_close.unwrap_or(f64::NAN),
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
                start,
                end,
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

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = self.options.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
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
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
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
            let bars = Self::parse_response(symbol, &body, start, end)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<MonthlyBar>, DataError> {
        self.fetch_with_retry(symbol, start, end)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 2019-01-01, 2019-02-01 and 2020-03-01 UTC
    const BODY: &str = r#"{"chart":{"result":[{"timestamp":[1546300800,1548979200,1583020800],
        "indicators":{"quote":[{"open":[10.0,11.0,12.0],"high":[10.5,11.5,12.5],
        "low":[9.5,10.5,11.5],"close":[10.2,null,12.2],"volume":[100,200,300]}],
        "adjclose":[{"adjclose":[10.1,null,12.1]}]}}],"error":null}}"#;

    #[test]
    fn url_encodes_index_symbols_and_interval() {
        let url = YahooProvider::chart_url("^GSPC", d(2019, 1, 1), d(2019, 12, 31));
        assert!(url.contains("/chart/%5EGSPC?"));
        assert!(url.contains("interval=1mo"));
        assert!(url.contains("period1=1546300800"));
        assert!(url.contains("period2=1577836799"));
    }

    #[test]
    fn january_end_stops_before_february_bar() {
        // 2020-02-01T00:00:00Z is 1580515200
        let url = YahooProvider::chart_url("AAPL", d(2019, 1, 1), d(2020, 1, 31));
        assert!(url.contains("period2=1580515199"));
    }

    #[test]
    fn parses_and_clips_to_window() {
        let bars = YahooProvider::parse_response("AAPL", BODY, d(2019, 1, 1), d(2019, 12, 31)).unwrap();
        // second bar has no close at all, third is outside the window
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2019, 1, 1));
        assert_eq!(bars[0].adj_close, 10.1);
        assert_eq!(bars[0].volume, 100);
    }

    #[test]
    fn not_found_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = YahooProvider::parse_response("ZZZZ", body, d(2019, 1, 1), d(2019, 12, 31)).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { symbol } if symbol == "ZZZZ"));
    }

    #[test]
    fn empty_window_is_an_error() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let err = YahooProvider::parse_response("AAPL", body, d(2019, 1, 1), d(2019, 12, 31)).unwrap_err();
        assert!(matches!(err, DataError::EmptyResult { .. }));
    }

    #[test]
    fn garbage_body_is_format_change() {
        let err = YahooProvider::parse_response("AAPL", "<html>", d(2019, 1, 1), d(2019, 12, 31)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }
}
