//! Criterion benchmarks for matrix hot paths.
//!
//! Benchmarks:
//! 1. Assembly of a 500-ticker × N-year matrix
//! 2. Top-K ranking of every year column
//! 3. Bulk export parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::NaiveDate;
use perfmatrix_core::data::{WideTableParser, WideTableWriter};
use perfmatrix_core::domain::{AnnualReturn, MonthlyBar};
use perfmatrix_core::{MatrixAssembler, TopKRanker, YearlyReturns};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_inputs(tickers: usize, years: i32) -> Vec<YearlyReturns> {
    (0..years)
        .map(|y| {
            let year = 2000 + y;
            let mut returns: Vec<AnnualReturn> = (0..tickers)
                .map(|i| {
                    let v = ((i as f64 * 0.37 + y as f64).sin()) * 60.0;
                    if (i + y as usize) % 17 == 0 {
                        AnnualReturn::fetch_failed(format!("T{i:03}"), year, "gap")
                    } else {
                        AnnualReturn::value(format!("T{i:03}"), year, v)
                    }
                })
                .collect();
            returns.push(AnnualReturn::value("^GSPC", year, 8.0));
            YearlyReturns { year, returns }
        })
        .collect()
}

fn make_export(tickers: usize) -> Vec<u8> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let columns: Vec<(String, Vec<MonthlyBar>)> = (0..tickers)
        .map(|i| {
            let bars = (0..14)
                .map(|m| {
                    let close = 100.0 + (i as f64 + m as f64 * 0.5).cos() * 10.0;
                    MonthlyBar {
                        date: start + chrono::Months::new(m),
                        open: close - 0.5,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        adj_close: close,
                        volume: 1_000_000,
                    }
                })
                .collect();
            (format!("T{i:03}"), bars)
        })
        .collect();
    let mut buf = Vec::new();
    WideTableWriter::write(&mut buf, &columns).unwrap();
    buf
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for years in [1, 6, 20] {
        let inputs = make_inputs(500, years);
        group.bench_with_input(BenchmarkId::from_parameter(years), &inputs, |b, inputs| {
            b.iter(|| MatrixAssembler::new("^GSPC").assemble(black_box(inputs)))
        });
    }
    group.finish();
}

fn bench_rank_all(c: &mut Criterion) {
    let matrix = MatrixAssembler::new("^GSPC").assemble(&make_inputs(500, 6));
    let ranker = TopKRanker::default();
    c.bench_function("rank_all_500x6", |b| b.iter(|| ranker.rank_all(black_box(&matrix))));
}

fn bench_parse_export(c: &mut Criterion) {
    let export = make_export(500);
    c.bench_function("parse_export_500", |b| {
        b.iter(|| WideTableParser::parse_reader(black_box(export.as_slice())).unwrap())
    });
}

criterion_group!(benches, bench_assemble, bench_rank_all, bench_parse_export);
criterion_main!(benches);
