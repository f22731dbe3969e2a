//! Bulk wide-format export: one file per year, one column group per ticker.
//!
//! Layout:
//!
//! ```text
//! Ticker,AAPL,AAPL.1,AAPL.2,AAPL.3,AAPL.4,AAPL.5,MSFT,MSFT.1,...
//! Price,Open,High,Low,Close,Adj Close,Volume,Open,...
//! Date,,,,,,,,...
//! 2019-01-01,154.89,158.85,142.0,166.44,160.9,1000,...
//! ```
//!
//! Column 0 is the row date. Ticker groups are `GROUP_WIDTH` columns wide and
//! the close field sits at absolute column `CLOSE_OFFSET`, repeating every
//! `GROUP_WIDTH` columns. The ticker is the label prefix before its first `.`.
//! The structure is validated against the header before any value is read.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;

use super::universe::parse_leading_date;
use crate::domain::{MonthlyBar, PricePoint, PriceSeries};
use crate::error::EngineError;

pub const GROUP_WIDTH: usize = 6;
pub const CLOSE_OFFSET: usize = 5;
/// Header rows after the label row that carry no data.
pub const HEADER_ROWS: usize = 2;

const FIELD_NAMES: [&str; GROUP_WIDTH] = ["Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// Close sub-series recovered from one export, in column order.
#[derive(Debug, Clone, Default)]
pub struct ParsedExport {
    pub series: Vec<PriceSeries>,
    /// Columns that produced no usable series.
    pub diagnostics: Vec<EngineError>,
}

fn ticker_of(label: &str) -> &str {
    label.split('.').next().unwrap_or(label).trim()
}

fn is_close_field(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.eq_ignore_ascii_case("close") || name.eq_ignore_ascii_case("adj close")
}

/// Absolute indices of every close column in a row of `width` columns.
pub fn close_columns(width: usize) -> Vec<usize> {
    (CLOSE_OFFSET..width).step_by(GROUP_WIDTH).collect()
}

pub struct WideTableParser;

impl WideTableParser {
    pub fn parse_path(path: &Path) -> Result<ParsedExport, EngineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::parse(path.display().to_string(), e.to_string()))?;
        Self::parse_reader(file)
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<ParsedExport, EngineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        let mut next_header = |what: &str| -> Result<csv::StringRecord, EngineError> {
            records
                .next()
                .ok_or_else(|| EngineError::parse("header", format!("missing {what} row")))?
                .map_err(|e| EngineError::parse("header", e.to_string()))
        };
        let labels = next_header("label")?;
        let fields = next_header("field")?;
        for _ in 1..HEADER_ROWS {
            next_header("spacer")?;
        }
        Self::validate_header(&labels, &fields)?;

        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut rows: Vec<csv::StringRecord> = Vec::new();
        for record in records {
            let record = record.map_err(|e| EngineError::parse("row", e.to_string()))?;
            let raw = record.get(0).unwrap_or_default();
            let date = parse_leading_date(raw)
                .ok_or_else(|| EngineError::parse("date", format!("unparseable date '{raw}'")))?;
            dates.push(date);
            rows.push(record);
        }

        let mut parsed = ParsedExport::default();
        for col in close_columns(labels.len()) {
            let label = labels.get(col).unwrap_or_default();
            let ticker = ticker_of(label);
            let points: Vec<PricePoint> = rows
                .iter()
                .zip(&dates)
                .filter_map(|(row, &date)| {
                    let close = row.get(col)?.trim().parse::<f64>().ok()?;
                    close.is_finite().then_some(PricePoint { date, close })
                })
                .collect();

            if points.is_empty() {
                parsed
                    .diagnostics
                    .push(EngineError::parse(label, "no numeric close values"));
                continue;
            }
            match PriceSeries::new(ticker, points) {
                Ok(series) => parsed.series.push(series),
                Err(e) => parsed.diagnostics.push(e),
            }
        }
        Ok(parsed)
    }

    fn validate_header(labels: &csv::StringRecord, fields: &csv::StringRecord) -> Result<(), EngineError> {
        let width = labels.len();
        if width < 1 + GROUP_WIDTH || (width - 1) % GROUP_WIDTH != 0 {
            return Err(EngineError::parse(
                "header",
                format!("expected 1 + {GROUP_WIDTH}·n columns, found {width}"),
            ));
        }

        for start in (1..width).step_by(GROUP_WIDTH) {
            let group: Vec<&str> = (start..start + GROUP_WIDTH)
                .map(|i| ticker_of(labels.get(i).unwrap_or_default()))
                .collect();
            if group[0].is_empty() || group.iter().any(|t| *t != group[0]) {
                return Err(EngineError::parse(
                    labels.get(start).unwrap_or_default(),
                    format!("column group at {start} does not belong to a single ticker"),
                ));
            }
        }

        for col in close_columns(width) {
            let field = fields.get(col).unwrap_or_default();
            if !is_close_field(field) {
                return Err(EngineError::parse(
                    labels.get(col).unwrap_or_default(),
                    format!("expected a close field at column {col}, found '{field}'"),
                ));
            }
        }
        Ok(())
    }
}

fn fmt_price(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

/// Writes exports in the layout `WideTableParser` reads.
///
/// Rows are the union of all bar dates, ascending; a ticker without a bar on
/// some date gets empty cells. Tickers with no bars at all still get a group.
pub struct WideTableWriter;

impl WideTableWriter {
    pub fn write_path(path: &Path, columns: &[(String, Vec<MonthlyBar>)]) -> Result<(), EngineError> {
        let file = std::fs::File::create(path)
            .map_err(|e| EngineError::parse(path.display().to_string(), e.to_string()))?;
        Self::write(file, columns)
    }

    pub fn write<W: Write>(writer: W, columns: &[(String, Vec<MonthlyBar>)]) -> Result<(), EngineError> {
        let io_err = |e: csv::Error| EngineError::parse("export", e.to_string());
        let mut wtr = csv::Writer::from_writer(writer);

        let mut labels = vec!["Ticker".to_string()];
        let mut fields = vec!["Price".to_string()];
        for (ticker, _) in columns {
            labels.push(ticker.clone());
            labels.extend((1..GROUP_WIDTH).map(|i| format!("{ticker}.{i}")));
            fields.extend(FIELD_NAMES.iter().map(|f| f.to_string()));
        }
        let mut spacer = vec![String::new(); labels.len()];
        spacer[0] = "Date".into();
        wtr.write_record(&labels).map_err(io_err)?;
        wtr.write_record(&fields).map_err(io_err)?;
        wtr.write_record(&spacer).map_err(io_err)?;

        let dates: BTreeSet<NaiveDate> = columns
            .iter()
            .flat_map(|(_, bars)| bars.iter().map(|b| b.date))
            .collect();
        for date in dates {
            let mut row = vec![date.format("%Y-%m-%d").to_string()];
            for (_, bars) in columns {
                match bars.iter().find(|b| b.date == date) {
                    Some(b) => row.extend([
                        fmt_price(b.open),
                        fmt_price(b.high),
                        fmt_price(b.low),
                        fmt_price(b.close),
                        fmt_price(b.effective_close().unwrap_or(f64::NAN)),
                        b.volume.to_string(),
                    ]),
                    None => row.extend(std::iter::repeat(String::new()).take(GROUP_WIDTH)),
                }
            }
            wtr.write_record(&row).map_err(io_err)?;
        }
        wtr.flush()
            .map_err(|e| EngineError::parse("export", e.to_string()))?;
        Ok(())
    }
}
