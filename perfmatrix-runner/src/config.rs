//! Engine configuration loaded from TOML.
//!
//! Every section is optional; omitted fields take the defaults of the
//! original S&P 500 study (2018–2023, `^GSPC`, top 25, 1.0 point tolerance).

use std::path::{Path, PathBuf};

use perfmatrix_core::domain::{Year, DEFAULT_BENCHMARK};
use perfmatrix_core::{DEFAULT_TOP_K, MIN_OBSERVATIONS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::FetchWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub benchmark: String,
    pub start_year: Year,
    pub end_year: Year,
    pub universe: UniverseConfig,
    pub fetch: FetchConfig,
    pub ranking: RankingConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// CSV with `date` and `tickers` columns.
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Window for the per-ticker build. Bulk exports always use `extended`.
    pub window: FetchWindow,
    pub parallel: bool,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub min_observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_k: usize,
    pub alphabetical_rows: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Flag a cell when `fresh - stored >= tolerance` (percentage points).
    pub tolerance: f64,
    /// Validate a random sample of this many cells instead of all of them.
    pub sample: Option<usize>,
    pub seed: u64,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for per-year bulk exports (`raw_data_{year}.csv`).
    pub raw_dir: PathBuf,
    /// Directory for the combined matrix and reports.
    pub final_dir: PathBuf,
    /// Explicit matrix path; defaults to `{final_dir}/{start}_{end}_stock_data.csv`.
    pub matrix_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            benchmark: DEFAULT_BENCHMARK.to_string(),
            start_year: 2018,
            end_year: 2023,
            universe: UniverseConfig::default(),
            fetch: FetchConfig::default(),
            ranking: RankingConfig::default(),
            validation: ValidationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/sp500_components.csv"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            window: FetchWindow::CalendarYear,
            parallel: false,
            max_retries: 1,
            timeout_secs: 30,
            min_observations: MIN_OBSERVATIONS,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            alphabetical_rows: false,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            sample: None,
            seed: 42,
            parallel: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw_data"),
            final_dir: PathBuf::from("data/final_data"),
            matrix_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.benchmark.trim().is_empty() {
            return Err(ConfigError::Invalid("benchmark must not be empty".into()));
        }
        if self.start_year > self.end_year {
            return Err(ConfigError::Invalid(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.ranking.top_k == 0 {
            return Err(ConfigError::Invalid("ranking.top_k must be at least 1".into()));
        }
        if self.fetch.min_observations == 0 {
            return Err(ConfigError::Invalid("fetch.min_observations must be at least 1".into()));
        }
        if !self.validation.tolerance.is_finite() || self.validation.tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "validation.tolerance must be a non-negative number, got {}",
                self.validation.tolerance
            )));
        }
        Ok(())
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        self.start_year..=self.end_year
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.output.matrix_path.clone().unwrap_or_else(|| {
            self.output
                .final_dir
                .join(format!("{}_{}_stock_data.csv", self.start_year, self.end_year))
        })
    }

    pub fn export_path(&self, year: Year) -> PathBuf {
        self.output.raw_dir.join(format!("raw_data_{year}.csv"))
    }
}
