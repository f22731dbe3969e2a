//! PerfMatrix Core: yearly performance aggregation engine.
//!
//! This crate contains the data-shape logic of the engine:
//! - Domain types (monthly bars, price series, annual returns)
//! - Data providers (Yahoo Finance chart API, in-memory replay)
//! - Universe resolution from a historical-constituents table
//! - Bulk wide-format export parsing and writing
//! - Annual return computation with a minimum-observation policy
//! - Ticker × year matrix assembly and persistence
//! - Top-K ranking against a pinned benchmark row

pub mod data;
pub mod domain;
pub mod error;
pub mod matrix;
pub mod ranking;
pub mod returns;

pub use error::EngineError;
pub use matrix::{Cell, MatrixAssembler, MissingReason, PerformanceMatrix, RowOrder, YearlyReturns};
pub use ranking::{RankedEntry, RankedSnapshot, TopKRanker, DEFAULT_TOP_K};
pub use returns::{round2, ReturnComputer, MIN_OBSERVATIONS};
