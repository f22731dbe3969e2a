//! Drift validation: re-fetch stored cells and compare against fresh returns.
//!
//! Every numeric cell of a persisted matrix is re-fetched over the extended
//! window and recomputed. The comparison is one-sided: a cell is flagged only
//! when the fresh return exceeds the stored one by at least the tolerance.
//! Validation never aborts; each cell becomes exactly one record.

use perfmatrix_core::data::{DataError, DataProvider};
use perfmatrix_core::domain::{PriceSeries, ReturnOutcome, Year};
use perfmatrix_core::{round2, EngineError, PerformanceMatrix, ReturnComputer, MIN_OBSERVATIONS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fetcher::{FetchWindow, YearlySeriesFetcher};

// ─── Records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationOutcome {
    Match,
    Mismatch,
    SkippedNoData,
    FetchError,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Match => "match",
            ValidationOutcome::Mismatch => "mismatch",
            ValidationOutcome::SkippedNoData => "skipped-no-data",
            ValidationOutcome::FetchError => "fetch-error",
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub ticker: String,
    pub year: Year,
    pub stored: f64,
    pub fresh: Option<f64>,
    pub outcome: ValidationOutcome,
    pub detail: String,
}

/// All records in matrix order plus running tallies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub records: Vec<ValidationRecord>,
    /// Fingerprint of the matrix that was validated.
    pub fingerprint: String,
    pub tolerance: f64,
}

impl ValidationReport {
    pub fn count(&self, outcome: ValidationOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(ValidationOutcome::Match)
    }

    /// Mismatches plus fetch errors. Skipped cells count as neither.
    pub fn failure_count(&self) -> usize {
        self.count(ValidationOutcome::Mismatch) + self.count(ValidationOutcome::FetchError)
    }

    /// `ticker (year)` labels for one outcome, in record order.
    pub fn tickers_with(&self, outcome: ValidationOutcome) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| format!("{} ({})", r.ticker, r.year))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Successful Validations: {}, Failed Validations: {}, Skipped: {}",
            self.success_count(),
            self.failure_count(),
            self.count(ValidationOutcome::SkippedNoData)
        )
    }
}

// ─── Classification ──────────────────────────────────────────────────

/// One-sided drift check at cent precision.
///
/// Both sides are rounded to 2 decimals and so is their difference, which
/// keeps `11.50 - 10.00` from landing a hair under `1.5`.
pub fn classify(stored: f64, fresh: f64, tolerance: f64) -> ValidationOutcome {
    let drift = round2(round2(fresh) - round2(stored));
    if drift >= tolerance {
        ValidationOutcome::Mismatch
    } else {
        ValidationOutcome::Match
    }
}

// ─── Validator ───────────────────────────────────────────────────────

pub struct DriftValidator<'a> {
    fetcher: YearlySeriesFetcher<'a>,
    computer: ReturnComputer,
    tolerance: f64,
    /// Fresh series at or below this length are skipped.
    skip_at_or_below: usize,
    sample: Option<(usize, u64)>,
    parallel: bool,
}

impl<'a> DriftValidator<'a> {
    pub fn new(provider: &'a dyn DataProvider, tolerance: f64) -> Self {
        Self {
            fetcher: YearlySeriesFetcher::new(provider, FetchWindow::Extended),
            computer: ReturnComputer::default(),
            tolerance,
            skip_at_or_below: MIN_OBSERVATIONS,
            sample: None,
            parallel: false,
        }
    }

    /// Validate `n` cells chosen with a seeded RNG instead of every cell.
    pub fn with_sample(mut self, n: usize, seed: u64) -> Self {
        self.sample = Some((n, seed));
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_computer(mut self, computer: ReturnComputer) -> Self {
        self.computer = computer;
        self
    }

    /// Cells to validate, in matrix order.
    pub fn targets<'m>(&self, matrix: &'m PerformanceMatrix) -> Vec<(&'m str, Year, f64)> {
        let cells = matrix.numeric_cells();
        let Some((n, seed)) = self.sample else {
            return cells;
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, cells.len(), n.min(cells.len())).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| cells[i]).collect()
    }

    pub fn validate(&self, matrix: &PerformanceMatrix) -> Result<ValidationReport, EngineError> {
        let targets = self.targets(matrix);
        tracing::info!(cells = targets.len(), tolerance = self.tolerance, "validating matrix");

        let check = |&(ticker, year, stored): &(&str, Year, f64)| {
            let record = self.validate_cell(ticker, year, stored);
            match record.outcome {
                ValidationOutcome::Match => {
                    tracing::info!(ticker, year, stored = record.stored, fresh = ?record.fresh, "validated")
                }
                ValidationOutcome::Mismatch => {
                    tracing::warn!(ticker, year, stored = record.stored, fresh = ?record.fresh, "validation failed")
                }
                ValidationOutcome::SkippedNoData => {
                    tracing::info!(ticker, year, "{}", record.detail)
                }
                ValidationOutcome::FetchError => {
                    tracing::error!(ticker, year, "{}", record.detail)
                }
            }
            record
        };

        let records: Vec<ValidationRecord> = if self.parallel {
            targets.par_iter().map(check).collect()
        } else {
            targets.iter().map(check).collect()
        };

        let report = ValidationReport {
            records,
            fingerprint: matrix.fingerprint()?,
            tolerance: self.tolerance,
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    pub fn validate_cell(&self, ticker: &str, year: Year, stored: f64) -> ValidationRecord {
        let record = |fresh: Option<f64>, outcome, detail: String| ValidationRecord {
            ticker: ticker.to_string(),
            year,
            stored,
            fresh,
            outcome,
            detail,
        };

        let bars = match self.fetcher.fetch_bars(ticker, year) {
            Ok(bars) => bars,
            Err(DataError::EmptyResult { .. }) => {
                return record(None, ValidationOutcome::SkippedNoData, format!("no data for {ticker} in {year}"));
            }
            Err(e) => {
                return record(None, ValidationOutcome::FetchError, format!("error fetching {ticker} for {year}: {e}"));
            }
        };
        let series = match PriceSeries::from_bars(ticker, &bars) {
            Ok(series) => series,
            Err(e) => return record(None, ValidationOutcome::FetchError, e.to_string()),
        };
        if series.len() <= self.skip_at_or_below {
            return record(
                None,
                ValidationOutcome::SkippedNoData,
                format!("not enough data for {ticker} in {year}: {} observations", series.len()),
            );
        }

        match self.computer.outcome(&series) {
            ReturnOutcome::Value { percent } => {
                let fresh = round2(percent);
                let outcome = classify(stored, fresh, self.tolerance);
                let detail = format!("stored {:.2}, fresh {:.2}", round2(stored), fresh);
                record(Some(fresh), outcome, detail)
            }
            ReturnOutcome::DivisionByZero => record(
                None,
                ValidationOutcome::Mismatch,
                format!("first price is zero for {ticker} in {year}"),
            ),
            other => record(None, ValidationOutcome::SkippedNoData, other.label().to_string()),
        }
    }
}
