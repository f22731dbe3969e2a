//! End-to-end runs over an in-memory provider: build, persist, rank, validate.

use chrono::NaiveDate;
use perfmatrix_core::data::{MemoryProvider, NoProgress, UniverseRow, UniverseTable};
use perfmatrix_core::{Cell, MissingReason, TopKRanker};
use perfmatrix_runner::export::{export_validation_csv, load_matrix, save_matrix};
use perfmatrix_runner::{
    build_matrix, combine_exports, download_exports, DriftValidator, EngineConfig,
    ValidationOutcome,
};

fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

/// 24 monthly closes from Jan 2020: flat at `first` then `last` each December.
fn two_years(first: f64, dec_2020: f64, dec_2021: f64) -> Vec<f64> {
    let mut closes = vec![first; 24];
    closes[11] = dec_2020;
    closes[12] = first;
    closes[23] = dec_2021;
    closes
}

fn universe() -> UniverseTable {
    UniverseTable::new(vec![
        UniverseRow { date: month(2020, 1), tickers: "AAA,BBB,CCC".into() },
        UniverseRow { date: month(2021, 1), tickers: "AAA,BBB,CCC,LATE".into() },
    ])
}

fn provider() -> MemoryProvider {
    MemoryProvider::new()
        .with_closes("AAA", month(2020, 1), &two_years(100.0, 110.0, 130.0))
        .with_closes("BBB", month(2020, 1), &two_years(100.0, 120.0, 90.0))
        .with_closes("CCC", month(2020, 1), &two_years(100.0, 105.0, 200.0))
        .with_closes("LATE", month(2021, 1), &[50.0; 12])
        .with_closes("^GSPC", month(2020, 1), &two_years(100.0, 116.0, 127.0))
}

fn config(dir: &std::path::Path) -> EngineConfig {
    let mut config = EngineConfig {
        start_year: 2020,
        end_year: 2021,
        ..EngineConfig::default()
    };
    config.output.raw_dir = dir.join("raw");
    config.output.final_dir = dir.join("final");
    config.ranking.top_k = 2;
    config
}

#[test]
fn build_persist_and_rank() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let report = build_matrix(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let path = cfg.matrix_path();
    assert!(path.ends_with("final/2020_2021_stock_data.csv"));
    save_matrix(&report.matrix, &path).unwrap();
    let matrix = load_matrix(&path, &cfg.benchmark).unwrap();

    // late joiner: missing, never zero
    assert_eq!(matrix.value("LATE", 2020), None);
    assert_eq!(report.matrix.cell("LATE", 2020), Some(Cell::Missing(MissingReason::Absent)));
    assert_eq!(matrix.value("LATE", 2021), Some(0.0));

    let ranker = TopKRanker::new(cfg.ranking.top_k);
    let snap_2020 = ranker.rank(&matrix, 2020).unwrap();
    let order: Vec<&str> = snap_2020.entries.iter().map(|e| e.ticker.as_str()).collect();
    assert_eq!(order, vec!["BBB", "AAA", "^GSPC"]);

    let snap_2021 = ranker.rank(&matrix, 2021).unwrap();
    let order: Vec<&str> = snap_2021.entries.iter().map(|e| e.ticker.as_str()).collect();
    assert_eq!(order, vec!["CCC", "AAA", "^GSPC"]);
    assert_eq!(snap_2021.benchmark().annual_return, Some(27.0));
}

#[test]
fn parallel_build_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    let seq = build_matrix(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    cfg.fetch.parallel = true;
    let par = build_matrix(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    assert_eq!(seq.matrix, par.matrix);
    assert_eq!(seq.matrix.fingerprint().unwrap(), par.matrix.fingerprint().unwrap());
}

#[test]
fn drift_validation_flags_upward_drift_only() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let built = build_matrix(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    save_matrix(&built.matrix, &cfg.matrix_path()).unwrap();
    let matrix = load_matrix(&cfg.matrix_path(), &cfg.benchmark).unwrap();

    // Fresh history ends in Feb 2021, so every 2021 cell sees two points.
    // Feb 2021 closes sit outside the 2020 window and must not move the result.
    let fresh = MemoryProvider::new()
        .with_closes("AAA", month(2020, 1), &{
            let mut c = vec![100.0; 14];
            c[12] = 111.5; // Jan 2021
            c[13] = 500.0;
            c
        })
        .with_closes("BBB", month(2020, 1), &{
            let mut c = vec![100.0; 14];
            c[12] = 110.9;
            c[13] = 10.0;
            c
        })
        .failing("CCC");

    let validator = DriftValidator::new(&fresh, cfg.validation.tolerance);
    let report = validator.validate(&matrix).unwrap();

    let find = |ticker: &str, year: i32| {
        report
            .records
            .iter()
            .find(|r| r.ticker == ticker && r.year == year)
            .unwrap()
    };
    // stored 10.00, fresh 11.50: mismatch
    assert_eq!(find("AAA", 2020).stored, 10.0);
    assert_eq!(find("AAA", 2020).fresh, Some(11.5));
    assert_eq!(find("AAA", 2020).outcome, ValidationOutcome::Mismatch);
    // stored 20.00, fresh 10.90: drift is downward, so a match
    assert_eq!(find("BBB", 2020).fresh, Some(10.9));
    assert_eq!(find("BBB", 2020).outcome, ValidationOutcome::Match);
    assert_eq!(find("CCC", 2020).outcome, ValidationOutcome::FetchError);
    // only Jan and Feb 2021 in the fresh provider
    assert_eq!(find("AAA", 2021).outcome, ValidationOutcome::SkippedNoData);
    assert_eq!(find("^GSPC", 2020).outcome, ValidationOutcome::FetchError);

    assert_eq!(report.records.len(), matrix.numeric_cells().len());
    assert_eq!(
        report.success_count() + report.failure_count() + report.count(ValidationOutcome::SkippedNoData),
        report.records.len()
    );

    let csv = export_validation_csv(&report).unwrap();
    assert!(csv.contains("AAA,2020,10.00,11.50,mismatch,"));
}

#[test]
fn bulk_route_agrees_with_extended_build() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fetch.window = perfmatrix_runner::FetchWindow::Extended;

    let direct = build_matrix(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    let downloaded = download_exports(&cfg, &universe(), &provider(), &NoProgress).unwrap();
    assert_eq!(downloaded.written.len(), 2);
    let combined = combine_exports(&cfg);

    for ticker in ["AAA", "BBB", "CCC", "^GSPC"] {
        for year in [2020, 2021] {
            assert_eq!(
                combined.matrix.value(ticker, year),
                direct.matrix.value(ticker, year),
                "{ticker} {year}"
            );
        }
    }
}
