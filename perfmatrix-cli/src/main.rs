//! PerfMatrix CLI: build, rank and validate the yearly performance matrix.
//!
//! Commands:
//! - `universe`: list a year's constituents (optionally diffed against another year)
//! - `build`: fetch every constituent per year and persist the matrix
//! - `download`: write one bulk wide-format export per year
//! - `combine`: parse the bulk exports into the matrix
//! - `rank`: top-K snapshots per year from the persisted matrix
//! - `validate`: re-fetch stored cells and log drift

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use perfmatrix_core::data::{CircuitBreaker, TracingProgress, UniverseTable, YahooOptions, YahooProvider};
use perfmatrix_core::domain::Year;
use perfmatrix_core::{ReturnComputer, TopKRanker};
use perfmatrix_runner::export::{
    generate_snapshot_markdown, generate_validation_summary, load_matrix, save_matrix,
    save_snapshots, save_validation,
};
use perfmatrix_runner::{
    build_matrix, combine_exports, download_exports, BuildReport, DriftValidator, EngineConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "perfmatrix",
    about = "PerfMatrix CLI: yearly performance matrix over a historical index universe"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to a TOML config file. Built-in defaults are used without it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write log events to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Benchmark symbol (default ^GSPC).
    #[arg(long, global = true)]
    benchmark: Option<String>,

    /// First year of the span.
    #[arg(long, global = true)]
    start_year: Option<Year>,

    /// Last year of the span (inclusive).
    #[arg(long, global = true)]
    end_year: Option<Year>,

    /// Historical constituents CSV (`date,tickers`).
    #[arg(long, global = true)]
    universe: Option<PathBuf>,

    /// Persisted matrix path.
    #[arg(long, global = true)]
    matrix: Option<PathBuf>,

    /// Fan fetches out over a thread pool.
    #[arg(long, global = true, default_value_t = false)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the constituents active in a year.
    Universe {
        year: Year,

        /// Show tickers added and removed since this year instead.
        #[arg(long)]
        diff_from: Option<Year>,
    },
    /// Fetch every constituent per year and persist the matrix.
    Build {
        /// Also write top-K snapshots for every year.
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Write one bulk wide-format export per year.
    Download,
    /// Parse the bulk exports into the matrix.
    Combine,
    /// Top-K snapshots from the persisted matrix.
    Rank {
        /// Single year to rank. All years when omitted.
        #[arg(long)]
        year: Option<Year>,

        /// Number of tickers per snapshot.
        #[arg(long)]
        top_k: Option<usize>,

        /// Write CSV and Markdown snapshots next to the matrix.
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    /// Re-fetch stored cells and compare with the persisted values.
    Validate {
        /// Validate a random sample of this many cells.
        #[arg(long)]
        sample: Option<usize>,

        /// Seed for sampling.
        #[arg(long)]
        seed: Option<u64>,

        /// Drift, in percentage points, that flags a cell.
        #[arg(long)]
        tolerance: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.log_file.as_deref())?;
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Universe { year, diff_from } => run_universe(&config, year, diff_from),
        Commands::Build { report } => run_build(&config, report),
        Commands::Download => run_download(&config),
        Commands::Combine => run_combine(&config),
        Commands::Rank { year, save, .. } => run_rank(&config, year, save),
        Commands::Validate { .. } => run_validate(&config),
    }
}

// ─── Setup ──────────────────────────────────────────────────────────

/// `RUST_LOG` overrides the default `info` level.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install logger: {e}"))
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = match &cli.global.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    apply_overrides(config, cli)
}

/// Fold command-line flags into the config, then validate the result so
/// flags face the same checks as the config file.
fn apply_overrides(mut config: EngineConfig, cli: &Cli) -> Result<EngineConfig> {
    let args = &cli.global;
    if let Some(benchmark) = &args.benchmark {
        config.benchmark = benchmark.clone();
    }
    if let Some(year) = args.start_year {
        config.start_year = year;
    }
    if let Some(year) = args.end_year {
        config.end_year = year;
    }
    if let Some(path) = &args.universe {
        config.universe.file = path.clone();
    }
    if let Some(path) = &args.matrix {
        config.output.matrix_path = Some(path.clone());
    }
    if args.parallel {
        config.fetch.parallel = true;
        config.validation.parallel = true;
    }

    match &cli.command {
        Commands::Rank { top_k: Some(k), .. } => config.ranking.top_k = *k,
        Commands::Validate {
            sample,
            seed,
            tolerance,
        } => {
            if sample.is_some() {
                config.validation.sample = *sample;
            }
            if let Some(seed) = seed {
                config.validation.seed = *seed;
            }
            if let Some(tolerance) = tolerance {
                config.validation.tolerance = *tolerance;
            }
        }
        _ => {}
    }

    config.validate()?;
    Ok(config)
}

fn load_universe(config: &EngineConfig) -> Result<UniverseTable> {
    UniverseTable::from_path(&config.universe.file).with_context(|| {
        format!(
            "failed to load universe table from {}",
            config.universe.file.display()
        )
    })
}

fn yahoo(config: &EngineConfig) -> Result<YahooProvider> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let options = YahooOptions {
        timeout: Duration::from_secs(config.fetch.timeout_secs),
        max_retries: config.fetch.max_retries,
        ..YahooOptions::default()
    };
    YahooProvider::new(breaker, options).context("failed to build Yahoo Finance client")
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_universe(config: &EngineConfig, year: Year, diff_from: Option<Year>) -> Result<()> {
    let table = load_universe(config)?;
    match diff_from {
        Some(from) => {
            let diff = table.diff(from, year, &config.benchmark)?;
            println!("Added {from} → {year} ({}): {}", diff.added.len(), diff.added.join(", "));
            println!("Removed {from} → {year} ({}): {}", diff.removed.len(), diff.removed.join(", "));
        }
        None => {
            let tickers = table.resolve(year, &config.benchmark)?;
            println!("{year}: {} tickers", tickers.len());
            println!("{}", tickers.join(","));
        }
    }
    Ok(())
}

fn print_build_summary(report: &BuildReport, path: &Path) {
    let m = &report.matrix;
    println!();
    println!("Matrix: {} tickers × {} years", m.tickers().len(), m.years().len());
    println!("Missing cells: {}", m.count_missing());
    println!("Diagnostics: {}", report.diagnostics.len());
    println!("Saved to: {}", path.display());
}

fn persist(config: &EngineConfig, report: &BuildReport, with_snapshots: bool) -> Result<()> {
    let path = config.matrix_path();
    save_matrix(&report.matrix, &path)?;
    tracing::info!(path = %path.display(), "matrix saved");

    if with_snapshots {
        let snapshots = TopKRanker::new(config.ranking.top_k).rank_all(&report.matrix);
        let written = save_snapshots(snapshots.values(), &config.output.final_dir)?;
        tracing::info!(files = written.len(), "snapshots saved");
    }
    print_build_summary(report, &path);
    Ok(())
}

fn run_build(config: &EngineConfig, with_snapshots: bool) -> Result<()> {
    let table = load_universe(config)?;
    let provider = yahoo(config)?;
    let report = build_matrix(config, &table, &provider, &TracingProgress)?;
    persist(config, &report, with_snapshots)
}

fn run_download(config: &EngineConfig) -> Result<()> {
    let table = load_universe(config)?;
    let provider = yahoo(config)?;
    let report = download_exports(config, &table, &provider, &TracingProgress)?;

    for (year, path) in &report.written {
        println!("{year}: {}", path.display());
    }
    if report.written.is_empty() {
        bail!("no exports were written");
    }
    Ok(())
}

fn run_combine(config: &EngineConfig) -> Result<()> {
    let report = combine_exports(config);
    if report.matrix.years().is_empty() {
        bail!(
            "no readable exports in {}",
            config.output.raw_dir.display()
        );
    }
    persist(config, &report, false)
}

fn run_rank(config: &EngineConfig, year: Option<Year>, save: bool) -> Result<()> {
    let matrix = load_matrix(&config.matrix_path(), &config.benchmark)?;
    let ranker = TopKRanker::new(config.ranking.top_k);

    let snapshots = match year {
        Some(year) => vec![ranker.rank(&matrix, year)?],
        None => ranker.rank_all(&matrix).into_values().collect(),
    };
    for snapshot in &snapshots {
        println!("{}", generate_snapshot_markdown(snapshot));
    }
    if save {
        let written = save_snapshots(&snapshots, &config.output.final_dir)?;
        println!("Saved {} files to {}", written.len(), config.output.final_dir.display());
    }
    Ok(())
}

fn run_validate(config: &EngineConfig) -> Result<()> {
    let matrix = load_matrix(&config.matrix_path(), &config.benchmark)?;
    let provider = yahoo(config)?;

    let mut validator = DriftValidator::new(&provider, config.validation.tolerance)
        .with_computer(ReturnComputer::with_min_observations(config.fetch.min_observations))
        .with_parallelism(config.validation.parallel);
    if let Some(n) = config.validation.sample {
        validator = validator.with_sample(n, config.validation.seed);
    }

    let report = validator.validate(&matrix)?;
    let log = save_validation(&report, &config.output.final_dir)?;

    println!("{}", generate_validation_summary(&report));
    println!("{}", report.summary());
    println!("Log saved to: {}", log.display());
    Ok(())
}
