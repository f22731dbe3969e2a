//! PerfMatrix Runner: orchestration on top of `perfmatrix-core`.
//!
//! This crate provides:
//! - TOML configuration with per-section defaults
//! - Yearly fetching with contained per-ticker failures and optional fan-out
//! - Build pipelines (per-ticker fetch, bulk download + combine)
//! - Drift validation of a persisted matrix against fresh data
//! - Report export (matrix, ranked snapshots, validation logs)

pub mod config;
pub mod export;
pub mod fetcher;
pub mod pipeline;
pub mod validator;

pub use config::{
    ConfigError, EngineConfig, FetchConfig, OutputConfig, RankingConfig, UniverseConfig,
    ValidationConfig,
};
pub use fetcher::{FetchWindow, TickerFetch, YearlySeriesFetcher};
pub use pipeline::{build_matrix, combine_exports, download_exports, BuildReport, DownloadReport};
pub use validator::{classify, DriftValidator, ValidationOutcome, ValidationRecord, ValidationReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<EngineConfig>();
        assert_sync::<EngineConfig>();
    }

    #[test]
    fn fetch_outcomes_are_send_sync() {
        assert_send::<TickerFetch>();
        assert_sync::<TickerFetch>();
    }

    #[test]
    fn fetcher_and_validator_are_shareable() {
        assert_sync::<YearlySeriesFetcher<'static>>();
        assert_sync::<DriftValidator<'static>>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BuildReport>();
        assert_sync::<BuildReport>();
        assert_send::<ValidationReport>();
        assert_sync::<ValidationReport>();
    }
}
