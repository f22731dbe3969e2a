//! Annual return for one ticker-year, with explicit failure markers.

use serde::{Deserialize, Serialize};

use super::Year;
use crate::error::EngineError;

/// Either a percentage change or the reason there is none.
///
/// Markers are never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnOutcome {
    Value { percent: f64 },
    InsufficientData { observations: usize },
    FetchFailed { reason: String },
    DivisionByZero,
}

impl ReturnOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value { percent } => Some(*percent),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Value { .. } => "value",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::DivisionByZero => "division_by_zero",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualReturn {
    pub ticker: String,
    pub year: Year,
    pub outcome: ReturnOutcome,
}

impl AnnualReturn {
    pub fn value(ticker: impl Into<String>, year: Year, percent: f64) -> Self {
        Self {
            ticker: ticker.into(),
            year,
            outcome: ReturnOutcome::Value { percent },
        }
    }

    pub fn fetch_failed(ticker: impl Into<String>, year: Year, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            year,
            outcome: ReturnOutcome::FetchFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn percent(&self) -> Option<f64> {
        self.outcome.value()
    }

    /// The diagnostic for a marked outcome; `None` for a value.
    pub fn diagnostic(&self) -> Option<EngineError> {
        let ticker = self.ticker.clone();
        let year = self.year;
        match &self.outcome {
            ReturnOutcome::Value { .. } => None,
            ReturnOutcome::InsufficientData { observations } => {
                Some(EngineError::InsufficientData {
                    ticker,
                    year,
                    observations: *observations,
                })
            }
            ReturnOutcome::FetchFailed { reason } => Some(EngineError::FetchFailure {
                ticker,
                year,
                reason: reason.clone(),
            }),
            ReturnOutcome::DivisionByZero => Some(EngineError::DivisionByZeroReturn { ticker, year }),
        }
    }
}
