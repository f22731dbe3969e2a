//! Reporting and export: persisted matrix, ranked snapshots, validation logs.
//!
//! - **Matrix**: `Ticker,<year>,…` CSV (see `PerformanceMatrix::write_csv`)
//! - **Snapshots**: `rank,ticker,return,excess` CSV and a Markdown table per year
//! - **Validation**: `ticker,year,stored,fresh,outcome,detail` CSV, JSON report,
//!   and a Markdown summary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use perfmatrix_core::{round2, PerformanceMatrix, RankedSnapshot};

use crate::validator::{ValidationOutcome, ValidationReport};

fn fmt2(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.2}", round2(v) + 0.0),
        None => String::new(),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

// ─── Matrix ─────────────────────────────────────────────────────────

pub fn save_matrix(matrix: &PerformanceMatrix, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    matrix
        .write_path(path)
        .with_context(|| format!("failed to write matrix to {}", path.display()))
}

pub fn load_matrix(path: &Path, benchmark: &str) -> Result<PerformanceMatrix> {
    PerformanceMatrix::read_path(path, benchmark)
        .with_context(|| format!("failed to read matrix from {}", path.display()))
}

// ─── Ranked snapshots ───────────────────────────────────────────────

/// Ranked rows numbered from 1; the benchmark row has an empty rank and excess.
pub fn export_snapshot_csv(snapshot: &RankedSnapshot) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["rank", "ticker", "return", "excess"])?;

    for (i, (entry, (_, excess))) in snapshot
        .ranked()
        .iter()
        .zip(snapshot.excess_returns())
        .enumerate()
    {
        wtr.write_record([
            &(i + 1).to_string(),
            &entry.ticker,
            &fmt2(entry.annual_return),
            &fmt2(excess),
        ])?;
    }
    let bench = snapshot.benchmark();
    wtr.write_record(["", bench.ticker.as_str(), fmt2(bench.annual_return).as_str(), ""])?;

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn generate_snapshot_markdown(snapshot: &RankedSnapshot) -> String {
    let mut md = String::with_capacity(1024);
    let bench = snapshot.benchmark();

    md.push_str(&format!(
        "# Top {} Performers of {}\n\n",
        snapshot.k, snapshot.year
    ));
    md.push_str("| Rank | Ticker | Return (%) | vs Benchmark |\n");
    md.push_str("| ---: | --- | ---: | ---: |\n");
    for (i, (entry, (_, excess))) in snapshot
        .ranked()
        .iter()
        .zip(snapshot.excess_returns())
        .enumerate()
    {
        let excess = match excess {
            Some(x) if x >= 0.0 => format!("+{:.2}", x),
            Some(x) => format!("{:.2}", x),
            None => "n/a".to_string(),
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            entry.ticker,
            display_return(entry.annual_return),
            excess
        ));
    }
    md.push_str(&format!(
        "| | **{}** | **{}** | |\n\n",
        bench.ticker,
        display_return(bench.annual_return)
    ));
    md.push_str(&format!(
        "{} of {} ranked tickers beat {}.\n",
        snapshot.beat_benchmark(),
        snapshot.ranked().len(),
        bench.ticker
    ));
    md
}

fn display_return(v: Option<f64>) -> String {
    match v {
        Some(_) => fmt2(v),
        None => "missing".to_string(),
    }
}

/// Write `top_{k}_{year}.csv` and `.md` for each snapshot. Returns written paths.
pub fn save_snapshots<'a>(
    snapshots: impl IntoIterator<Item = &'a RankedSnapshot>,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create report dir: {}", output_dir.display()))?;

    let mut written = Vec::new();
    for snapshot in snapshots {
        let stem = format!("top_{}_{}", snapshot.k, snapshot.year);

        let csv_path = output_dir.join(format!("{stem}.csv"));
        std::fs::write(&csv_path, export_snapshot_csv(snapshot)?)
            .with_context(|| format!("failed to write {}", csv_path.display()))?;

        let md_path = output_dir.join(format!("{stem}.md"));
        std::fs::write(&md_path, generate_snapshot_markdown(snapshot))
            .with_context(|| format!("failed to write {}", md_path.display()))?;

        written.push(csv_path);
        written.push(md_path);
    }
    Ok(written)
}

// ─── Validation ─────────────────────────────────────────────────────

pub fn export_validation_csv(report: &ValidationReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "year", "stored", "fresh", "outcome", "detail"])?;
    for r in &report.records {
        wtr.write_record([
            &r.ticker,
            &r.year.to_string(),
            &fmt2(Some(r.stored)),
            &fmt2(r.fresh),
            &r.outcome.to_string(),
            &r.detail,
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_validation_json(report: &ValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ValidationReport to JSON")
}

pub fn generate_validation_summary(report: &ValidationReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str("# Validation Summary\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Matrix | `{}` |\n", report.fingerprint));
    md.push_str(&format!("| Tolerance | {:.2} |\n", report.tolerance));
    md.push_str(&format!("| Cells checked | {} |\n", report.records.len()));
    md.push_str(&format!("| Successful | {} |\n", report.success_count()));
    md.push_str(&format!("| Failed | {} |\n", report.failure_count()));
    md.push_str(&format!(
        "| Skipped (no data) | {} |\n\n",
        report.count(ValidationOutcome::SkippedNoData)
    ));

    for (title, outcome) in [
        ("Mismatches", ValidationOutcome::Mismatch),
        ("Fetch errors", ValidationOutcome::FetchError),
        ("Skipped", ValidationOutcome::SkippedNoData),
    ] {
        let tickers = report.tickers_with(outcome);
        if !tickers.is_empty() {
            md.push_str(&format!("## {title}\n\n{}\n\n", tickers.join(", ")));
        }
    }
    md
}

/// Write `validation_log_{timestamp}.csv` and the JSON report into `output_dir`.
pub fn save_validation(report: &ValidationReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create log dir: {}", output_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let csv_path = output_dir.join(format!("validation_log_{stamp}.csv"));
    std::fs::write(&csv_path, export_validation_csv(report)?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    let json_path = output_dir.join(format!("validation_log_{stamp}.json"));
    std::fs::write(&json_path, export_validation_json(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    Ok(csv_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidationRecord;
    use perfmatrix_core::domain::AnnualReturn;
    use perfmatrix_core::{MatrixAssembler, TopKRanker, YearlyReturns};

    fn matrix() -> PerformanceMatrix {
        let returns = vec![
            AnnualReturn::value("A", 2020, 10.0),
            AnnualReturn::value("B", 2020, 20.0),
            AnnualReturn::fetch_failed("C", 2020, "timeout"),
            AnnualReturn::value("^GSPC", 2020, 12.5),
        ];
        MatrixAssembler::new("^GSPC").assemble(&[YearlyReturns { year: 2020, returns }])
    }

    #[test]
    fn snapshot_csv_layout() {
        let snap = TopKRanker::new(2).rank(&matrix(), 2020).unwrap();
        let csv = export_snapshot_csv(&snap).unwrap();
        assert_eq!(
            csv,
            "rank,ticker,return,excess\n1,B,20.00,7.50\n2,A,10.00,-2.50\n,^GSPC,12.50,\n"
        );
    }

    #[test]
    fn snapshot_markdown_mentions_benchmark() {
        let snap = TopKRanker::new(5).rank(&matrix(), 2020).unwrap();
        let md = generate_snapshot_markdown(&snap);
        assert!(md.starts_with("# Top 5 Performers of 2020"));
        assert!(md.contains("| 3 | C | missing | n/a |"));
        assert!(md.contains("**^GSPC**"));
        assert!(md.contains("1 of 3 ranked tickers beat ^GSPC."));
    }

    fn report() -> ValidationReport {
        ValidationReport {
            records: vec![
                ValidationRecord {
                    ticker: "A".into(),
                    year: 2020,
                    stored: 10.0,
                    fresh: Some(11.5),
                    outcome: ValidationOutcome::Mismatch,
                    detail: "stored 10.00, fresh 11.50".into(),
                },
                ValidationRecord {
                    ticker: "B".into(),
                    year: 2020,
                    stored: 20.0,
                    fresh: None,
                    outcome: ValidationOutcome::FetchError,
                    detail: "timeout".into(),
                },
            ],
            fingerprint: "abc".into(),
            tolerance: 1.0,
        }
    }

    #[test]
    fn validation_csv_layout() {
        let csv = export_validation_csv(&report()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ticker,year,stored,fresh,outcome,detail");
        assert_eq!(lines[1], "A,2020,10.00,11.50,mismatch,\"stored 10.00, fresh 11.50\"");
        assert_eq!(lines[2], "B,2020,20.00,,fetch-error,timeout");
    }

    #[test]
    fn validation_summary_lists_failures() {
        let md = generate_validation_summary(&report());
        assert!(md.contains("| Failed | 2 |"));
        assert!(md.contains("## Mismatches\n\nA (2020)"));
        assert!(!md.contains("## Skipped"));
    }

    #[test]
    fn validation_json_uses_kebab_outcomes() {
        let json = export_validation_json(&report()).unwrap();
        assert!(json.contains("\"fetch-error\""));
    }

    #[test]
    fn files_land_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let m = matrix();
        let path = dir.path().join("final").join("m.csv");
        save_matrix(&m, &path).unwrap();
        assert_eq!(load_matrix(&path, "^GSPC").unwrap().value("B", 2020), Some(20.0));

        let snaps = TopKRanker::new(2).rank_all(&m);
        let written = save_snapshots(snaps.values(), dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("top_2_2020.md").exists());

        let log = save_validation(&report(), &dir.path().join("logs")).unwrap();
        assert!(log.exists());
    }
}
