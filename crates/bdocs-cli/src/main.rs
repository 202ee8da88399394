//! `bdocs`: operator tool for sentence records and release dates.
//!
//! # Usage
//!
//! ```
//! bdocs sentence add --inmate <UUID> --case <UUID> --type IMPRISONMENT \
//!   --date 2020-06-15 --term-days 3650
//! bdocs adjust --sentence <UUID> --type GOOD_TIME --days 30 \
//!   --effective 2021-01-01 --reason "annual award"
//! bdocs summary <INMATE_UUID>
//! ```
//!
//! Reads `bdocs.toml` (or the path given with `--config`) and `BDOCS_*`
//! environment variables.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use bdocs_core::ReleaseCalculator;
use bdocs_store_sqlite::SqliteStore;
use chrono::NaiveDate;
use clap::Parser;
use settings::CliConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sentence records and release date projection")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "bdocs.toml")]
  config: PathBuf,

  /// Evaluate as of this date instead of the local calendar date.
  #[arg(long, value_name = "DATE", global = true)]
  today: Option<NaiveDate>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays pure JSON.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = CliConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = cfg.resolved_store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let calculator = ReleaseCalculator::new(cfg.calculator);
  let store = SqliteStore::open(&store_path, calculator)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(?store_path, config = ?cfg.calculator, "store opened");

  let today = cli
    .today
    .unwrap_or_else(|| chrono::Local::now().date_naive());

  let mut stdout = std::io::stdout().lock();
  commands::run(cli.command, &store, calculator, today, &mut stdout).await
}
