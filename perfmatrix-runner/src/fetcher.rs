//! Yearly series fetcher: one outcome per ticker, failures contained.
//!
//! Fetches are independent, so the batch can fan out over rayon. Outcomes are
//! collected by input position, never by completion order.

use chrono::NaiveDate;
use perfmatrix_core::data::{DataError, DataProvider, FetchProgress};
use perfmatrix_core::domain::{MonthlyBar, Year};
use perfmatrix_core::EngineError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Date window requested for a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchWindow {
    /// `[year-01-01, year-12-31]`
    CalendarYear,
    /// `[year-01-01, (year+1)-01-31]`: the calendar year plus next January,
    /// tolerating source lag. February of the next year is excluded.
    Extended,
}

impl FetchWindow {
    pub fn bounds(&self, year: Year) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = match self {
            FetchWindow::CalendarYear => NaiveDate::from_ymd_opt(year, 12, 31)?,
            FetchWindow::Extended => NaiveDate::from_ymd_opt(year + 1, 1, 31)?,
        };
        Some((start, end))
    }
}

/// Outcome of fetching one ticker for one year.
#[derive(Debug, Clone)]
pub struct TickerFetch {
    pub ticker: String,
    pub year: Year,
    pub outcome: Result<Vec<MonthlyBar>, EngineError>,
}

pub struct YearlySeriesFetcher<'a> {
    provider: &'a dyn DataProvider,
    window: FetchWindow,
    parallel: bool,
}

impl<'a> YearlySeriesFetcher<'a> {
    pub fn new(provider: &'a dyn DataProvider, window: FetchWindow) -> Self {
        Self {
            provider,
            window,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn window(&self) -> FetchWindow {
        self.window
    }

    /// Raw provider call for one ticker-year, keeping the transport error.
    pub fn fetch_bars(&self, ticker: &str, year: Year) -> Result<Vec<MonthlyBar>, DataError> {
        if !self.provider.is_available() {
            return Err(DataError::CircuitBreakerTripped);
        }
        let (start, end) = self
            .window
            .bounds(year)
            .ok_or_else(|| DataError::Other(format!("year {year} out of range")))?;
        self.provider.fetch(ticker, start, end)
    }

    fn fetch_one(&self, ticker: &str, year: Year) -> TickerFetch {
        let outcome = self.fetch_bars(ticker, year).map_err(|e| EngineError::FetchFailure {
            ticker: ticker.to_string(),
            year,
            reason: e.to_string(),
        });
        TickerFetch {
            ticker: ticker.to_string(),
            year,
            outcome,
        }
    }

    /// Fetch every ticker for `year`. The result has one entry per input
    /// ticker, in input order.
    pub fn fetch_year(&self, tickers: &[String], year: Year, progress: &dyn FetchProgress) -> Vec<TickerFetch> {
        let total = tickers.len();
        let run = |(i, ticker): (usize, &String)| {
            progress.on_start(ticker, i, total);
            let fetched = self.fetch_one(ticker, year);
            match &fetched.outcome {
                Ok(_) => progress.on_complete(ticker, i, total, None),
                Err(e) => {
                    let err = DataError::Other(e.to_string());
                    progress.on_complete(ticker, i, total, Some(&err));
                }
            }
            fetched
        };

        let results: Vec<TickerFetch> = if self.parallel {
            tickers.par_iter().enumerate().map(run).collect()
        } else {
            tickers.iter().enumerate().map(run).collect()
        };

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        progress.on_batch_complete(total - failed, failed, total);
        tracing::info!(year, fetched = total - failed, failed, "year fetched");
        results
    }
}
