//! Domain types for the yearly performance engine.

pub mod annual_return;
pub mod series;

pub use annual_return::{AnnualReturn, ReturnOutcome};
pub use series::{MonthlyBar, PricePoint, PriceSeries};

/// Calendar year used as a matrix column key.
pub type Year = i32;

/// Ticker symbol.
pub type Ticker = String;

/// Default benchmark: the S&P 500 index.
pub const DEFAULT_BENCHMARK: &str = "^GSPC";
