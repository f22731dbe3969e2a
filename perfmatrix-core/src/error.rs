//! Engine error taxonomy.
//!
//! Per-ticker and per-year variants are never propagated across a batch: they
//! are carried as diagnostics next to partial results. Only `NoUniverseForYear`
//! and `UnknownYearColumn` are returned to callers as hard failures.

use thiserror::Error;

use crate::domain::Year;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no universe row for year {year}")]
    NoUniverseForYear { year: Year },

    #[error("fetch failed for {ticker} in {year}: {reason}")]
    FetchFailure {
        ticker: String,
        year: Year,
        reason: String,
    },

    #[error("insufficient data for {ticker} in {year}: {observations} observations")]
    InsufficientData {
        ticker: String,
        year: Year,
        observations: usize,
    },

    #[error("first price is zero for {ticker} in {year}")]
    DivisionByZeroReturn { ticker: String, year: Year },

    #[error("year column {year} not present in matrix")]
    UnknownYearColumn { year: Year },

    #[error("parse failure in column '{column}': {reason}")]
    ParseFailure { column: String, reason: String },
}

impl EngineError {
    pub fn parse(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Ticker this diagnostic is tied to, if any.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Self::FetchFailure { ticker, .. }
            | Self::InsufficientData { ticker, .. }
            | Self::DivisionByZeroReturn { ticker, .. } => Some(ticker),
            _ => None,
        }
    }

    /// Whether this condition aborts the operation that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoUniverseForYear { .. } | Self::UnknownYearColumn { .. }
        )
    }
}
