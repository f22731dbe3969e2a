//! Data sources, the universe reference table and bulk exports

pub mod circuit_breaker;
pub mod memory;
pub mod provider;
pub mod universe;
pub mod wide_table;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use memory::MemoryProvider;
pub use provider::{DataError, DataProvider, FetchProgress, NoProgress, TracingProgress};
pub use universe::{UniverseDiff, UniverseRow, UniverseTable};
pub use wide_table::{ParsedExport, WideTableParser, WideTableWriter};
pub use yahoo::{YahooOptions, YahooProvider};
