//! Annual percentage return from a close-price series.
//!
//! `return = (last - first) / first * 100` over the first and last points of
//! the series. Series shorter than the observation threshold produce an
//! `InsufficientData` marker so partial years never yield a number.

use crate::domain::{AnnualReturn, PriceSeries, ReturnOutcome, Year};

/// Roughly one close per month over a full calendar year.
pub const MIN_OBSERVATIONS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnComputer {
    min_observations: usize,
}

impl Default for ReturnComputer {
    fn default() -> Self {
        Self {
            min_observations: MIN_OBSERVATIONS,
        }
    }
}

impl ReturnComputer {
    /// Threshold is clamped to at least one observation.
    pub fn with_min_observations(min_observations: usize) -> Self {
        Self {
            min_observations: min_observations.max(1),
        }
    }

    pub fn min_observations(&self) -> usize {
        self.min_observations
    }

    pub fn outcome(&self, series: &PriceSeries) -> ReturnOutcome {
        let observations = series.len();
        let (first, last) = match (series.first(), series.last()) {
            (Some(f), Some(l)) if observations >= self.min_observations => (f.close, l.close),
            _ => return ReturnOutcome::InsufficientData { observations },
        };
        if first == 0.0 {
            return ReturnOutcome::DivisionByZero;
        }
        ReturnOutcome::Value {
            percent: (last - first) / first * 100.0,
        }
    }

    pub fn compute(&self, series: &PriceSeries, year: Year) -> AnnualReturn {
        AnnualReturn {
            ticker: series.ticker().to_string(),
            year,
            outcome: self.outcome(series),
        }
    }
}

/// Round to two decimals, the precision returns are persisted and compared at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + chrono::Months::new(i as u32),
                close,
            })
            .collect();
        PriceSeries::new("TEST", points).unwrap()
    }

    #[test]
    fn padded_year_returns_twenty_percent() {
        let mut closes = vec![100.0, 110.0, 90.0];
        closes.extend(std::iter::repeat(105.0).take(8));
        closes.push(120.0);
        assert_eq!(closes.len(), 12);

        let r = ReturnComputer::default().compute(&series(&closes), 2019);
        assert_eq!(r.year, 2019);
        assert!((r.percent().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn eleven_observations_is_insufficient() {
        let closes = vec![100.0; 11];
        let outcome = ReturnComputer::default().outcome(&series(&closes));
        assert_eq!(outcome, ReturnOutcome::InsufficientData { observations: 11 });
    }

    #[test]
    fn empty_series_is_insufficient() {
        let outcome = ReturnComputer::default().outcome(&series(&[]));
        assert_eq!(outcome, ReturnOutcome::InsufficientData { observations: 0 });
    }

    #[test]
    fn zero_first_price_is_division_by_zero() {
        let mut closes = vec![0.0];
        closes.extend(std::iter::repeat(10.0).take(12));
        let outcome = ReturnComputer::default().outcome(&series(&closes));
        assert_eq!(outcome, ReturnOutcome::DivisionByZero);
    }

    #[test]
    fn threshold_never_below_one() {
        let rc = ReturnComputer::with_min_observations(0);
        assert_eq!(rc.min_observations(), 1);
        let outcome = rc.outcome(&series(&[50.0]));
        assert_eq!(outcome, ReturnOutcome::Value { percent: 0.0 });
    }

    #[test]
    fn negative_year() {
        let mut closes = vec![200.0; 12];
        closes[11] = 150.0;
        let r = ReturnComputer::default().outcome(&series(&closes));
        assert_eq!(r.value(), Some(-25.0));
    }

    #[test]
    fn rounding_to_two_decimals() {
        assert_eq!(round2(11.499), 11.5);
        assert_eq!(round2(-3.14159), -3.14);
    }
}
