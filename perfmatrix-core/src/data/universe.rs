//! Ticker universe per year from a historical-constituents table.
//!
//! The reference table has one row per effective date with the full
//! comma-joined constituent list. A year's universe is the first row dated in
//! that year; membership is treated as static for the whole year. The
//! benchmark is always appended.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::domain::Year;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseRow {
    pub date: NaiveDate,
    pub tickers: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseTable {
    rows: Vec<UniverseRow>,
}

/// Tickers entering and leaving between two years.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Parse `YYYY-MM-DD`, ignoring any trailing time component.
pub fn parse_leading_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

impl UniverseTable {
    pub fn new(rows: Vec<UniverseRow>) -> Self {
        Self { rows }
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::parse(path.display().to_string(), e.to_string()))?;
        Self::from_reader(file)
    }

    /// Read a CSV with `date` and `tickers` header columns, in any position.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EngineError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| EngineError::parse("header", e.to_string()))?
            .clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| EngineError::parse(name, "column missing from universe file"))
        };
        let date_col = position("date")?;
        let tickers_col = position("tickers")?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| EngineError::parse("row", e.to_string()))?;
            let raw_date = record.get(date_col).unwrap_or_default();
            let date = parse_leading_date(raw_date)
                .ok_or_else(|| EngineError::parse("date", format!("unparseable date '{raw_date}'")))?;
            rows.push(UniverseRow {
                date,
                tickers: record.get(tickers_col).unwrap_or_default().to_string(),
            });
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[UniverseRow] {
        &self.rows
    }

    /// Distinct years covered by the table, ascending.
    pub fn years(&self) -> Vec<Year> {
        self.rows
            .iter()
            .map(|r| r.date.year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tickers active in `year`, benchmark last when not already listed.
    ///
    /// Empty tokens are dropped and duplicates keep their first position.
    pub fn resolve(&self, year: Year, benchmark: &str) -> Result<Vec<String>, EngineError> {
        let row = self
            .rows
            .iter()
            .find(|r| r.date.year() == year)
            .ok_or(EngineError::NoUniverseForYear { year })?;

        let mut seen = HashSet::new();
        let mut tickers: Vec<String> = row
            .tickers
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_string()))
            .map(String::from)
            .collect();
        if !seen.contains(benchmark) {
            tickers.push(benchmark.to_string());
        }
        Ok(tickers)
    }

    pub fn diff(&self, from: Year, to: Year, benchmark: &str) -> Result<UniverseDiff, EngineError> {
        let a: BTreeSet<String> = self.resolve(from, benchmark)?.into_iter().collect();
        let b: BTreeSet<String> = self.resolve(to, benchmark)?.into_iter().collect();
        Ok(UniverseDiff {
            added: b.difference(&a).cloned().collect(),
            removed: a.difference(&b).cloned().collect(),
        })
    }
}
