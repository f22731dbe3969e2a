//! Ticker × year performance matrix.
//!
//! Ordering contracts are enforced when the matrix is assembled or read,
//! never inherited from container iteration order:
//! - year columns ascend;
//! - ticker rows follow first appearance (inputs visited in ascending year
//!   order, stable within a year) unless alphabetical order is requested;
//! - the benchmark row is always present.

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use std::path::Path;

use crate::domain::{AnnualReturn, ReturnOutcome, Year};
use crate::error::EngineError;
use crate::returns::round2;

/// Why a cell holds no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// The ticker was not in that year's input at all.
    Absent,
    InsufficientData,
    FetchFailed,
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Value(f64),
    Missing(MissingReason),
}

impl Cell {
    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::Missing(_) => None,
        }
    }

    fn from_outcome(outcome: &ReturnOutcome) -> Self {
        match outcome {
            ReturnOutcome::Value { percent } => Cell::Value(*percent),
            ReturnOutcome::InsufficientData { .. } => Cell::Missing(MissingReason::InsufficientData),
            ReturnOutcome::FetchFailed { .. } => Cell::Missing(MissingReason::FetchFailed),
            ReturnOutcome::DivisionByZero => Cell::Missing(MissingReason::DivisionByZero),
        }
    }
}

/// All annual returns computed for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyReturns {
    pub year: Year,
    pub returns: Vec<AnnualReturn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    #[default]
    FirstAppearance,
    Alphabetical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMatrix {
    benchmark: String,
    tickers: Vec<String>,
    years: Vec<Year>,
    /// Row-major: `cells[row][col]`.
    cells: Vec<Vec<Cell>>,
}

impl PerformanceMatrix {
    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    pub fn row_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    pub fn column_index(&self, year: Year) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    pub fn cell(&self, ticker: &str, year: Year) -> Option<Cell> {
        let row = self.row_index(ticker)?;
        let col = self.column_index(year)?;
        Some(self.cells[row][col])
    }

    pub fn value(&self, ticker: &str, year: Year) -> Option<f64> {
        self.cell(ticker, year).and_then(|c| c.value())
    }

    /// `(ticker, value)` for every row in one year column, in row order.
    pub fn column(&self, year: Year) -> Result<Vec<(&str, Option<f64>)>, EngineError> {
        let col = self
            .column_index(year)
            .ok_or(EngineError::UnknownYearColumn { year })?;
        Ok(self
            .tickers
            .iter()
            .zip(&self.cells)
            .map(|(t, row)| (t.as_str(), row[col].value()))
            .collect())
    }

    /// Every numeric cell as `(ticker, year, value)`, row-major.
    pub fn numeric_cells(&self) -> Vec<(&str, Year, f64)> {
        self.tickers
            .iter()
            .zip(&self.cells)
            .flat_map(|(t, row)| {
                self.years
                    .iter()
                    .zip(row)
                    .filter_map(move |(&y, c)| c.value().map(|v| (t.as_str(), y, v)))
            })
            .collect()
    }

    pub fn count_missing(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| c.value().is_none())
            .count()
    }

    fn ensure_benchmark(&mut self) {
        if self.row_index(&self.benchmark).is_none() {
            self.tickers.push(self.benchmark.clone());
            self.cells
                .push(vec![Cell::Missing(MissingReason::Absent); self.years.len()]);
        }
    }

    // ─── Persistence ────────────────────────────────────────────────

    /// Write `Ticker,<year>,…` with values rounded to 2 decimals, missing empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), EngineError> {
        let io_err = |e: csv::Error| EngineError::parse("matrix", e.to_string());
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["Ticker".to_string()];
        header.extend(self.years.iter().map(|y| y.to_string()));
        wtr.write_record(&header).map_err(io_err)?;

        for (ticker, row) in self.tickers.iter().zip(&self.cells) {
            let mut record = vec![ticker.clone()];
            record.extend(row.iter().map(|c| match c.value() {
                // `+ 0.0` folds -0.0 so it prints as 0.00
                Some(v) => format!("{:.2}", round2(v) + 0.0),
                None => String::new(),
            }));
            wtr.write_record(&record).map_err(io_err)?;
        }
        wtr.flush()
            .map_err(|e| EngineError::parse("matrix", e.to_string()))
    }

    pub fn to_csv_string(&self) -> Result<String, EngineError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| EngineError::parse("matrix", e.to_string()))
    }

    pub fn write_path(&self, path: &Path) -> Result<(), EngineError> {
        let file = std::fs::File::create(path)
            .map_err(|e| EngineError::parse(path.display().to_string(), e.to_string()))?;
        self.write_csv(file)
    }

    /// Read a persisted matrix. A leading unnamed index column is skipped,
    /// year columns are re-sorted ascending and the benchmark row is added
    /// if the file lacks it.
    pub fn read_csv<R: Read>(reader: R, benchmark: &str) -> Result<Self, EngineError> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| EngineError::parse("header", e.to_string()))?
            .clone();

        let ticker_col = match (headers.get(0).map(str::trim), headers.get(1).map(str::trim)) {
            (Some("Ticker"), _) => 0,
            (Some(""), Some("Ticker")) => 1,
            _ => return Err(EngineError::parse("Ticker", "ticker column missing")),
        };

        let mut file_years = Vec::new();
        for raw in headers.iter().skip(ticker_col + 1) {
            let year = raw
                .trim()
                .parse::<Year>()
                .map_err(|_| EngineError::parse(raw, "column header is not a year"))?;
            file_years.push(year);
        }
        let years: Vec<Year> = file_years.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if years.len() != file_years.len() {
            return Err(EngineError::parse("header", "duplicate year column"));
        }
        let positions: Vec<usize> = file_years
            .iter()
            .map(|y| years.binary_search(y).unwrap_or_default())
            .collect();

        let mut tickers = Vec::new();
        let mut cells = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| EngineError::parse("row", e.to_string()))?;
            let ticker = record.get(ticker_col).unwrap_or_default().trim().to_string();
            if ticker.is_empty() {
                continue;
            }
            if tickers.contains(&ticker) {
                return Err(EngineError::parse("Ticker", format!("duplicate row for {ticker}")));
            }

            let mut row = vec![Cell::Missing(MissingReason::Absent); years.len()];
            for (i, &pos) in positions.iter().enumerate() {
                let raw = record.get(ticker_col + 1 + i).unwrap_or_default().trim();
                if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
                    continue;
                }
                let v = raw.parse::<f64>().map_err(|_| {
                    EngineError::parse(file_years[i].to_string(), format!("'{raw}' for {ticker} is not numeric"))
                })?;
                if v.is_finite() {
                    row[pos] = Cell::Value(v);
                }
            }
            tickers.push(ticker);
            cells.push(row);
        }

        let mut matrix = Self {
            benchmark: benchmark.to_string(),
            tickers,
            years,
            cells,
        };
        matrix.ensure_benchmark();
        Ok(matrix)
    }

    pub fn read_path(path: &Path, benchmark: &str) -> Result<Self, EngineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::parse(path.display().to_string(), e.to_string()))?;
        Self::read_csv(file, benchmark)
    }

    /// BLAKE3 hex digest of the persisted form.
    pub fn fingerprint(&self) -> Result<String, EngineError> {
        let csv = self.to_csv_string()?;
        Ok(blake3::hash(csv.as_bytes()).to_hex().to_string())
    }
}

/// Combines per-year returns into a `PerformanceMatrix`.
#[derive(Debug, Clone)]
pub struct MatrixAssembler {
    benchmark: String,
    order: RowOrder,
}

impl MatrixAssembler {
    pub fn new(benchmark: impl Into<String>) -> Self {
        Self {
            benchmark: benchmark.into(),
            order: RowOrder::default(),
        }
    }

    pub fn with_order(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }

    /// Union tickers and years across inputs.
    ///
    /// For a repeated `(ticker, year)`: a value replaces a marker, a later
    /// value replaces an earlier one, and a marker never replaces a value.
    pub fn assemble(&self, inputs: &[YearlyReturns]) -> PerformanceMatrix {
        let mut visit: Vec<&YearlyReturns> = inputs.iter().collect();
        visit.sort_by_key(|y| y.year);

        let years: Vec<Year> = visit
            .iter()
            .map(|y| y.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tickers: Vec<String> = Vec::new();
        let mut rows: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<Vec<Cell>> = Vec::new();

        for yearly in visit {
            let col = years.binary_search(&yearly.year).unwrap_or_default();
            for ret in &yearly.returns {
                let row = *rows.entry(ret.ticker.clone()).or_insert_with(|| {
                    tickers.push(ret.ticker.clone());
                    cells.push(vec![Cell::Missing(MissingReason::Absent); years.len()]);
                    tickers.len() - 1
                });
                let incoming = Cell::from_outcome(&ret.outcome);
                let slot = &mut cells[row][col];
                if incoming.value().is_some() || slot.value().is_none() {
                    *slot = incoming;
                }
            }
        }

        let mut matrix = PerformanceMatrix {
            benchmark: self.benchmark.clone(),
            tickers,
            years,
            cells,
        };
        matrix.ensure_benchmark();

        if self.order == RowOrder::Alphabetical {
            let mut rows: Vec<(String, Vec<Cell>)> =
                matrix.tickers.drain(..).zip(matrix.cells.drain(..)).collect();
            rows.sort_by(|a, b| a.0.cmp(&b.0));
            for (t, c) in rows {
                matrix.tickers.push(t);
                matrix.cells.push(c);
            }
        }
        matrix
    }
}
