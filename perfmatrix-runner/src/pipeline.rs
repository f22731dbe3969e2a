//! Build pipelines: universe → fetch/parse → returns → matrix.
//!
//! Two routes produce the same matrix shape:
//! - `build_matrix` fetches each ticker per year and computes returns directly;
//! - `download_exports` writes one bulk wide-format file per year, and
//!   `combine_exports` parses those files back into returns.
//!
//! Per-ticker and per-year failures become diagnostics. A missing universe
//! row for a requested year is the only hard failure.

use std::path::PathBuf;

use perfmatrix_core::data::{
    DataProvider, FetchProgress, UniverseTable, WideTableParser, WideTableWriter,
};
use perfmatrix_core::domain::{AnnualReturn, PriceSeries, Year};
use perfmatrix_core::{
    EngineError, MatrixAssembler, PerformanceMatrix, ReturnComputer, RowOrder, YearlyReturns,
};

use crate::config::EngineConfig;
use crate::fetcher::{FetchWindow, TickerFetch, YearlySeriesFetcher};

/// Matrix plus every contained failure met on the way.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub matrix: PerformanceMatrix,
    pub yearly: Vec<YearlyReturns>,
    pub diagnostics: Vec<EngineError>,
}

impl BuildReport {
    pub fn failed_tickers(&self) -> Vec<(&str, Year)> {
        self.yearly
            .iter()
            .flat_map(|y| y.returns.iter())
            .filter(|r| r.percent().is_none())
            .map(|r| (r.ticker.as_str(), r.year))
            .collect()
    }
}

/// Files written by a bulk download.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub written: Vec<(Year, PathBuf)>,
    pub diagnostics: Vec<EngineError>,
}

pub fn assembler_for(config: &EngineConfig) -> MatrixAssembler {
    let order = if config.ranking.alphabetical_rows {
        RowOrder::Alphabetical
    } else {
        RowOrder::FirstAppearance
    };
    MatrixAssembler::new(config.benchmark.clone()).with_order(order)
}

/// Turn one year's fetch outcomes into annual returns, one per ticker.
pub fn returns_from_fetches(
    fetches: Vec<TickerFetch>,
    year: Year,
    computer: &ReturnComputer,
    diagnostics: &mut Vec<EngineError>,
) -> YearlyReturns {
    let returns = fetches
        .into_iter()
        .map(|f| {
            let ret = match f.outcome {
                Ok(bars) => match PriceSeries::from_bars(&f.ticker, &bars) {
                    Ok(series) => computer.compute(&series, year),
                    Err(e) => AnnualReturn::fetch_failed(&f.ticker, year, e.to_string()),
                },
                Err(e) => {
                    let reason = match &e {
                        EngineError::FetchFailure { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    AnnualReturn::fetch_failed(&f.ticker, year, reason)
                }
            };
            if let Some(diag) = ret.diagnostic() {
                tracing::warn!(ticker = %ret.ticker, year, "{diag}");
                diagnostics.push(diag);
            }
            ret
        })
        .collect();
    YearlyReturns { year, returns }
}

/// Per-ticker route: fetch every universe member for every configured year.
pub fn build_matrix(
    config: &EngineConfig,
    universe: &UniverseTable,
    provider: &dyn DataProvider,
    progress: &dyn FetchProgress,
) -> Result<BuildReport, EngineError> {
    let fetcher = YearlySeriesFetcher::new(provider, config.fetch.window).parallel(config.fetch.parallel);
    let computer = ReturnComputer::with_min_observations(config.fetch.min_observations);

    // Resolve every year first so a missing row fails before any network call.
    let universes = config
        .years()
        .map(|year| universe.resolve(year, &config.benchmark).map(|t| (year, t)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut yearly = Vec::with_capacity(universes.len());
    let mut diagnostics = Vec::new();
    for (year, tickers) in universes {
        tracing::info!(year, tickers = tickers.len(), "fetching year");
        let fetches = fetcher.fetch_year(&tickers, year, progress);
        yearly.push(returns_from_fetches(fetches, year, &computer, &mut diagnostics));
    }

    let matrix = assembler_for(config).assemble(&yearly);
    tracing::info!(
        tickers = matrix.tickers().len(),
        years = matrix.years().len(),
        missing = matrix.count_missing(),
        "matrix assembled"
    );
    Ok(BuildReport {
        matrix,
        yearly,
        diagnostics,
    })
}

/// Bulk route, step one: one wide export per year over the extended window.
///
/// A year whose file cannot be written is logged and skipped.
pub fn download_exports(
    config: &EngineConfig,
    universe: &UniverseTable,
    provider: &dyn DataProvider,
    progress: &dyn FetchProgress,
) -> Result<DownloadReport, EngineError> {
    let fetcher = YearlySeriesFetcher::new(provider, FetchWindow::Extended).parallel(config.fetch.parallel);
    let mut report = DownloadReport::default();

    if let Err(e) = std::fs::create_dir_all(&config.output.raw_dir) {
        return Err(EngineError::parse(
            config.output.raw_dir.display().to_string(),
            e.to_string(),
        ));
    }

    for year in config.years() {
        let tickers = universe.resolve(year, &config.benchmark)?;
        let fetches = fetcher.fetch_year(&tickers, year, progress);

        let mut columns = Vec::with_capacity(fetches.len());
        for f in fetches {
            match f.outcome {
                Ok(bars) => columns.push((f.ticker, bars)),
                Err(e) => {
                    // The ticker keeps an empty column group, as the source does.
                    report.diagnostics.push(e);
                    columns.push((f.ticker, Vec::new()));
                }
            }
        }

        let path = config.export_path(year);
        match WideTableWriter::write_path(&path, &columns) {
            Ok(()) => {
                tracing::info!(year, path = %path.display(), "{year} data downloaded");
                report.written.push((year, path));
            }
            Err(e) => {
                tracing::error!(year, "{year} data download has some issues: {e}");
                report.diagnostics.push(e);
            }
        }
    }
    Ok(report)
}

/// Bulk route, step two: parse each year's export into returns and assemble.
///
/// A year whose file is missing or structurally invalid contributes no
/// column; its failure is kept as a diagnostic.
pub fn combine_exports(config: &EngineConfig) -> BuildReport {
    let computer = ReturnComputer::with_min_observations(config.fetch.min_observations);
    let mut yearly = Vec::new();
    let mut diagnostics = Vec::new();

    for year in config.years() {
        let path = config.export_path(year);
        let parsed = match WideTableParser::parse_path(&path) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(year, path = %path.display(), "{year} data read has some issues: {e}");
                diagnostics.push(e);
                continue;
            }
        };
        for diag in parsed.diagnostics {
            tracing::debug!(year, "{diag}");
            diagnostics.push(diag);
        }

        let returns: Vec<AnnualReturn> = parsed
            .series
            .iter()
            .map(|series| computer.compute(series, year))
            .collect();
        diagnostics.extend(returns.iter().filter_map(AnnualReturn::diagnostic));
        yearly.push(YearlyReturns { year, returns });
    }

    let matrix = assembler_for(config).assemble(&yearly);
    BuildReport {
        matrix,
        yearly,
        diagnostics,
    }
}
