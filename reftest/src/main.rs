//! reftest - exposure index and reference-file regression tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reftest::db::{create_index, open_index, ExposureStore};
use reftest::logging;
use reftest::matching::MatchEngine;
use reftest::regression::{run_regression, CommandRunner, TestStatus};
use reftest::rules::{CatalogRuleService, RuleResolver};
use reftest::services::{IngestMode, IngestPipeline};
use reftest_common::config::{resolve_database_path, TomlConfig, DATABASE_ENV_VAR};
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line arguments for reftest
#[derive(Parser, Debug)]
#[command(name = "reftest")]
#[command(about = "Index FITS exposures and regression-test calibration reference files")]
#[command(version)]
struct Args {
    /// Index database
    #[arg(long, global = true, env = DATABASE_ENV_VAR)]
    db: Option<PathBuf>,

    /// Configuration file (default: <config_dir>/reftest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rule catalogue (overrides `rules` in the configuration file)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new, empty index database
    Create,
    /// Index an exposure unless its configuration is already indexed
    Add { file_path: PathBuf },
    /// Index an exposure regardless of configuration duplicates
    Force { file_path: PathBuf },
    /// Index an exposure, replacing one with the same configuration
    Replace { file_path: PathBuf },
    /// Crawl a directory or glob and index every exposure found
    Bulk {
        root: PathBuf,
        /// Duplicate policy for each file
        #[arg(long, value_enum, default_value = "add")]
        mode: BulkMode,
    },
    /// Print exposures a reference file applies to
    Find {
        reference_file: PathBuf,
        #[arg(long)]
        max_matches: Option<i64>,
    },
    /// Calibrate matching exposures with a reference file
    Test {
        reference_file: PathBuf,
        /// Test this exposure instead of searching the index
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        max_matches: Option<i64>,
        /// Parallel calibration runs (0 = one per core)
        #[arg(long, default_value = "0")]
        workers: usize,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BulkMode {
    Add,
    Force,
    Replace,
}

impl From<BulkMode> for IngestMode {
    fn from(mode: BulkMode) -> Self {
        match mode {
            BulkMode::Add => IngestMode::Add,
            BulkMode::Force => IngestMode::Force,
            BulkMode::Replace => IngestMode::Replace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = logging::load_config_logged(logging::bootstrap_subscriber(), args.config.as_deref())
        .context("Failed to load configuration")?;
    logging::init(&config.logging);

    info!("reftest v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.db.as_deref(), DATABASE_ENV_VAR, &config)
        .context("Cannot determine index database")?;
    info!("Database path: {}", db_path.display());

    match args.command {
        Command::Create => {
            create_index(&db_path)
                .await
                .with_context(|| format!("Failed to create {}", db_path.display()))?;
            println!("Created {}", db_path.display());
        }
        Command::Add { file_path } => ingest_one(&db_path, &config, IngestMode::Add, &file_path).await?,
        Command::Force { file_path } => ingest_one(&db_path, &config, IngestMode::Force, &file_path).await?,
        Command::Replace { file_path } => {
            ingest_one(&db_path, &config, IngestMode::Replace, &file_path).await?
        }
        Command::Bulk { root, mode } => {
            let store = ExposureStore::new(open_index(&db_path).await?);
            let pipeline = IngestPipeline::new(store, mode.into(), &config.ingest);
            let report = pipeline
                .ingest(&root)
                .await
                .with_context(|| format!("Bulk ingest of {} failed", root.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Find {
            reference_file,
            max_matches,
        } => {
            let engine = match_engine(&db_path, &config, args.rules.as_deref()).await?;
            let matches = engine
                .find_matches(&reference_file, max_matches)
                .await
                .with_context(|| format!("Matching {} failed", reference_file.display()))?;
            for path in matches {
                println!("{}", path.display());
            }
        }
        Command::Test {
            reference_file,
            data,
            max_matches,
            workers,
        } => {
            let runner_config = config
                .runner
                .clone()
                .context("No [runner] section in configuration; cannot calibrate")?;
            let runner = CommandRunner::from_config(&runner_config);

            let data_files = match data {
                Some(file) => vec![file],
                None => {
                    let engine = match_engine(&db_path, &config, args.rules.as_deref()).await?;
                    engine
                        .find_matches(&reference_file, max_matches)
                        .await
                        .with_context(|| format!("Matching {} failed", reference_file.display()))?
                }
            };

            let reference = reference_file.clone();
            let results = tokio::task::spawn_blocking(move || {
                run_regression(&runner, &reference, &data_files, workers)
            })
            .await
            .context("Regression task failed")??;

            let passed = results.iter().filter(|r| r.status == TestStatus::Passed).count();
            println!("{}", serde_json::to_string_pretty(&results)?);
            println!("{}/{} passed", passed, results.len());
        }
    }

    Ok(())
}

async fn ingest_one(db_path: &Path, config: &TomlConfig, mode: IngestMode, file_path: &Path) -> Result<()> {
    let store = ExposureStore::new(open_index(db_path).await?);
    let pipeline = IngestPipeline::new(store, mode, &config.ingest);
    let outcome = pipeline
        .add_file(file_path)
        .await
        .with_context(|| format!("Failed to {} {}", mode, file_path.display()))?;
    println!("{}: {:?}", file_path.display(), outcome);
    Ok(())
}

async fn match_engine(
    db_path: &Path,
    config: &TomlConfig,
    rules_override: Option<&Path>,
) -> Result<MatchEngine<CatalogRuleService>> {
    let service = match rules_override.or(config.rules.as_deref()) {
        Some(path) => CatalogRuleService::load(path).context("Failed to load rule catalogue")?,
        None => {
            info!("No rule catalogue configured; using built-in bindings only");
            CatalogRuleService::builtin()
        }
    };

    let store = ExposureStore::new(open_index(db_path).await?);
    Ok(MatchEngine::new(store, RuleResolver::new(service)))
}
