//! Top-K selection per year with a pinned benchmark row.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::Year;
use crate::error::EngineError;
use crate::matrix::PerformanceMatrix;

pub const DEFAULT_TOP_K: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub ticker: String,
    pub annual_return: Option<f64>,
}

/// One year's top performers followed by the benchmark.
///
/// `entries` holds at most K non-benchmark rows, best first; the benchmark is
/// always the final entry, whatever its return.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSnapshot {
    pub year: Year,
    pub k: usize,
    pub entries: Vec<RankedEntry>,
}

impl RankedSnapshot {
    pub fn benchmark(&self) -> &RankedEntry {
        // Construction always pushes the benchmark last.
        &self.entries[self.entries.len() - 1]
    }

    /// Ranked tickers, benchmark excluded.
    pub fn ranked(&self) -> &[RankedEntry] {
        &self.entries[..self.entries.len() - 1]
    }

    /// Return minus benchmark return, per ranked ticker.
    pub fn excess_returns(&self) -> Vec<(&str, Option<f64>)> {
        let bench = self.benchmark().annual_return;
        self.ranked()
            .iter()
            .map(|e| {
                let excess = e.annual_return.zip(bench).map(|(r, b)| r - b);
                (e.ticker.as_str(), excess)
            })
            .collect()
    }

    /// How many ranked tickers strictly beat the benchmark.
    pub fn beat_benchmark(&self) -> usize {
        self.excess_returns()
            .iter()
            .filter(|(_, x)| x.is_some_and(|x| x > 0.0))
            .count()
    }
}

/// Descending by value, missing last. Equal keys compare equal so a stable
/// sort keeps row order.
fn descending_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKRanker {
    k: usize,
}

impl Default for TopKRanker {
    fn default() -> Self {
        Self { k: DEFAULT_TOP_K }
    }
}

impl TopKRanker {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn rank(&self, matrix: &PerformanceMatrix, year: Year) -> Result<RankedSnapshot, EngineError> {
        let column = matrix.column(year)?;
        let benchmark = matrix.benchmark();

        let mut contenders: Vec<(&str, Option<f64>)> = column
            .iter()
            .copied()
            .filter(|(t, _)| *t != benchmark)
            .collect();
        contenders.sort_by(|a, b| descending_missing_last(a.1, b.1));

        let mut entries: Vec<RankedEntry> = contenders
            .into_iter()
            .take(self.k)
            .map(|(t, r)| RankedEntry {
                ticker: t.to_string(),
                annual_return: r,
            })
            .collect();
        entries.push(RankedEntry {
            ticker: benchmark.to_string(),
            annual_return: matrix.value(benchmark, year),
        });

        Ok(RankedSnapshot {
            year,
            k: self.k,
            entries,
        })
    }

    /// Snapshot for every year column.
    pub fn rank_all(&self, matrix: &PerformanceMatrix) -> BTreeMap<Year, RankedSnapshot> {
        matrix
            .years()
            .iter()
            .filter_map(|&y| self.rank(matrix, y).ok().map(|s| (y, s)))
            .collect()
    }
}
