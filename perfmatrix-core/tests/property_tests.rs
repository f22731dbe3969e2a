//! Property tests for aggregation invariants.
//!
//! Uses proptest to verify:
//! 1. Return policy: short series never produce a value
//! 2. Assembly: deterministic, benchmark always present, years ascending
//! 3. Ranking: length K+1 (or n+1), benchmark last, descending values
//! 4. Persistence: a written matrix reads back to the same rounded values

use chrono::NaiveDate;
use proptest::prelude::*;
use perfmatrix_core::domain::{AnnualReturn, PricePoint, PriceSeries, ReturnOutcome};
use perfmatrix_core::{
    round2, MatrixAssembler, PerformanceMatrix, ReturnComputer, TopKRanker, YearlyReturns,
    MIN_OBSERVATIONS,
};

const BENCH: &str = "^GSPC";

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, len)
}

fn series(closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint {
            date: start + chrono::Months::new(i as u32),
            close,
        })
        .collect();
    PriceSeries::new("T", points).unwrap()
}

/// Per-year inputs over a small ticker pool; `None` cells become fetch failures.
fn arb_inputs() -> impl Strategy<Value = Vec<YearlyReturns>> {
    let cell = (0usize..8, prop::option::of(-90.0..300.0_f64));
    let year = (2015i32..2022, prop::collection::vec(cell, 0..8));
    prop::collection::vec(year, 0..5).prop_map(|years| {
        years
            .into_iter()
            .map(|(year, cells)| YearlyReturns {
                year,
                returns: cells
                    .into_iter()
                    .map(|(t, v)| {
                        let ticker = if t == 0 { BENCH.to_string() } else { format!("T{t}") };
                        match v {
                            Some(v) => AnnualReturn::value(ticker, year, v),
                            None => AnnualReturn::fetch_failed(ticker, year, "boom"),
                        }
                    })
                    .collect(),
            })
            .collect()
    })
}

// ── 1. Return policy ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn short_series_never_yield_a_value(closes in arb_closes(1..MIN_OBSERVATIONS)) {
        let outcome = ReturnComputer::default().outcome(&series(&closes));
        prop_assert_eq!(outcome, ReturnOutcome::InsufficientData { observations: closes.len() });
    }

    #[test]
    fn full_series_use_first_and_last(closes in arb_closes(MIN_OBSERVATIONS..30)) {
        let first = closes[0];
        let last = closes[closes.len() - 1];
        let got = ReturnComputer::default().outcome(&series(&closes)).value().unwrap();
        prop_assert!((got - (last - first) / first * 100.0).abs() < 1e-9);
    }
}

// ── 2. Assembly ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn assembly_is_deterministic(inputs in arb_inputs()) {
        let a = MatrixAssembler::new(BENCH).assemble(&inputs);
        let b = MatrixAssembler::new(BENCH).assemble(&inputs);
        prop_assert_eq!(a.to_csv_string().unwrap(), b.to_csv_string().unwrap());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn benchmark_present_and_years_ascending(inputs in arb_inputs()) {
        let m = MatrixAssembler::new(BENCH).assemble(&inputs);
        prop_assert!(m.row_index(BENCH).is_some());
        prop_assert!(m.years().windows(2).all(|w| w[0] < w[1]));
        let mut tickers = m.tickers().to_vec();
        tickers.sort();
        tickers.dedup();
        prop_assert_eq!(tickers.len(), m.tickers().len());
    }
}

// ── 3. Ranking ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn snapshot_shape(inputs in arb_inputs(), k in 1usize..6) {
        let m = MatrixAssembler::new(BENCH).assemble(&inputs);
        let contenders = m.tickers().len() - 1;
        for (_, snap) in TopKRanker::new(k).rank_all(&m) {
            prop_assert_eq!(snap.entries.len(), k.min(contenders) + 1);
            prop_assert_eq!(snap.benchmark().ticker.as_str(), BENCH);
            prop_assert!(snap.ranked().iter().all(|e| e.ticker != BENCH));

            // values descend, missing only after every value
            let values: Vec<Option<f64>> = snap.ranked().iter().map(|e| e.annual_return).collect();
            for w in values.windows(2) {
                match (w[0], w[1]) {
                    (Some(a), Some(b)) => prop_assert!(a >= b),
                    (None, Some(_)) => prop_assert!(false, "missing ranked above a value"),
                    _ => {}
                }
            }
        }
    }
}

// ── 4. Persistence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn persisted_values_read_back_rounded(inputs in arb_inputs()) {
        let m = MatrixAssembler::new(BENCH).assemble(&inputs);
        let csv = m.to_csv_string().unwrap();
        let back = PerformanceMatrix::read_csv(csv.as_bytes(), BENCH).unwrap();

        prop_assert_eq!(back.tickers(), m.tickers());
        prop_assert_eq!(back.years(), m.years());
        for t in m.tickers() {
            for &y in m.years() {
                let want = m.value(t, y).map(round2);
                let got = back.value(t, y);
                match (want, got) {
                    (Some(a), Some(b)) => prop_assert!((a - b).abs() < 1e-9),
                    (None, None) => {}
                    other => prop_assert!(false, "cell {t}/{y} mismatch: {other:?}"),
                }
            }
        }
    }
}
