//! Monthly bars and the close-price series derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Raw monthly OHLCV bar as returned by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl MonthlyBar {
    /// The close used for return computation: adjusted close when the source
    /// reported one, raw close otherwise. `None` when neither is finite.
    pub fn effective_close(&self) -> Option<f64> {
        if self.adj_close.is_finite() {
            Some(self.adj_close)
        } else if self.close.is_finite() {
            Some(self.close)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronologically ordered close prices for one ticker over one year.
///
/// Timestamps are strictly increasing. Length is not fixed; the return policy
/// decides whether there are enough observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, EngineError> {
        let ticker = ticker.into();
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(EngineError::parse(
                ticker,
                format!("timestamps not increasing at {}", w[1].date),
            ));
        }
        Ok(Self { ticker, points })
    }

    /// Build a series from provider bars, dropping bars without a finite close.
    pub fn from_bars(ticker: impl Into<String>, bars: &[MonthlyBar]) -> Result<Self, EngineError> {
        let points = bars
            .iter()
            .filter_map(|b| {
                b.effective_close()
                    .map(|close| PricePoint { date: b.date, close })
            })
            .collect();
        Self::new(ticker, points)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}
