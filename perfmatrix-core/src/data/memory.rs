//! In-memory provider for tests and offline replays.
//!
//! Holds full bar histories per symbol and serves the slice inside the
//! requested window. Symbols can be marked as failing to exercise the
//! per-ticker failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use super::provider::{DataError, DataProvider};
use crate::domain::MonthlyBar;

#[derive(Debug, Default)]
pub struct MemoryProvider {
    bars: HashMap<String, Vec<MonthlyBar>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bars for a symbol. Bars are kept sorted by date.
    pub fn with_bars(mut self, symbol: &str, mut bars: Vec<MonthlyBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    /// Register month-start bars from a list of closes, beginning at `start`.
    pub fn with_closes(self, symbol: &str, start: NaiveDate, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| MonthlyBar {
                date: start + chrono::Months::new(i as u32),
                open: close,
                high: close,
                low: close,
                close,
                adj_close: close,
                volume: 0,
            })
            .collect();
        self.with_bars(symbol, bars)
    }

    /// Every fetch for `symbol` fails with a network error.
    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    /// Number of `fetch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<MonthlyBar>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(symbol) {
            return Err(DataError::NetworkUnreachable(format!("simulated outage for {symbol}")));
        }
        let all = self.bars.get(symbol).ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        let bars: Vec<MonthlyBar> = all
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        Ok(bars)
    }

    fn is_available(&self) -> bool {
        true
    }
}
