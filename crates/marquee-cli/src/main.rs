//! `marquee`: loads a Sakila rental database into a star-schema warehouse.
//!
//! # Usage
//!
//! ```
//! marquee init
//! marquee full-load --force
//! marquee incremental
//! marquee validate --days 7
//! marquee --json incremental
//! marquee --config /etc/marquee.toml incremental
//! ```
//!
//! Paths and the calendar range come from `marquee.toml` (or the file given
//! with `--config`) and may be overridden with `MARQUEE_*` environment
//! variables, e.g. `MARQUEE_WAREHOUSE_PATH`.

mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context as _, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use marquee_core::calendar::PopulateOutcome;
use marquee_sqlite::{SqliteSource, SqliteWarehouse, pipeline};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{WarehouseConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Sakila to star-schema warehouse loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "marquee.toml")]
  config: PathBuf,

  /// Print the command's summary to stdout as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Populate the date dimension, seed watermarks and create indexes.
  Init,
  /// Load every source row into the warehouse.
  FullLoad {
    /// Drop every warehouse table before loading.
    #[arg(long)]
    force: bool,
  },
  /// Apply source changes made since the last run.
  Incremental,
  /// Compare source and warehouse aggregates.
  Validate {
    /// Size of the trailing window for dated figures.
    #[arg(long, default_value_t = 30)]
    days: u32,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  // Logs go to stderr; stdout carries `--json` output only.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  match run(cli).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!("{e:#}");
      ExitCode::FAILURE
    }
  }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MARQUEE"))
    .build()
    .context("failed to read config file")?;

  let cfg: WarehouseConfig = settings
    .try_deserialize()
    .context("failed to deserialise WarehouseConfig")?;

  // Validation never writes, so it must not create or migrate the file.
  let read_only = matches!(cli.command, Command::Validate { .. });
  let warehouse = open_warehouse(&cfg, read_only).await?;

  // Taken before any source read so rows changed mid-run are rescanned.
  let run_at = Local::now().naive_local();

  match cli.command {
    Command::Init => {
      let report = pipeline::init(&warehouse, cfg.date_range())
        .await
        .context("init failed")?;
      let dates = match report.dates {
        PopulateOutcome::Inserted(n) => n,
        PopulateOutcome::AlreadyPopulated => 0,
      };
      if cli.json {
        print_json(&serde_json::json!({ "dates": dates, "seeded": report.seeded }))?;
      }
      tracing::info!(dates, seeded = report.seeded, "init finished");
    }
    Command::FullLoad { force } => {
      let source = open_source(&cfg).await?;
      let summary =
        pipeline::full_load(&source, &warehouse, force, cfg.date_range(), run_at)
          .await
          .context("full load failed")?;
      if cli.json {
        print_json(&summary)?;
      }
      tracing::info!("full load wrote {} rows", summary.total_changed());
    }
    Command::Incremental => {
      let source = open_source(&cfg).await?;
      let summary = pipeline::incremental(&source, &warehouse, run_at)
        .await
        .context("incremental sync failed")?;
      if cli.json {
        print_json(&summary)?;
      }
      tracing::info!("incremental sync wrote {} rows", summary.total_changed());
    }
    Command::Validate { days } => {
      let source = open_source(&cfg).await?;
      let report = pipeline::validate(&source, &warehouse, days, run_at.date())
        .await
        .context("validation query failed")?;
      if cli.json {
        print_json(&report)?;
      }
      if let Some(check) = report.failed_check() {
        bail!(
          "validation failed on {}: source {} vs warehouse {}",
          check.name,
          check.source,
          check.warehouse
        );
      }
      tracing::info!("all {} checks passed over the last {days} days", report.checks.len());
    }
  }

  Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to serialise summary")?;
  println!("{out}");
  Ok(())
}

async fn open_warehouse(
  cfg: &WarehouseConfig,
  read_only: bool,
) -> anyhow::Result<SqliteWarehouse> {
  let path = expand_tilde(&cfg.warehouse_path);
  let warehouse = if read_only {
    SqliteWarehouse::open_existing(&path).await
  } else {
    SqliteWarehouse::open(&path).await
  };
  warehouse.with_context(|| format!("failed to open warehouse at {path:?}"))
}

async fn open_source(cfg: &WarehouseConfig) -> anyhow::Result<SqliteSource> {
  let path = expand_tilde(&cfg.source_path);
  SqliteSource::open(&path)
    .await
    .with_context(|| format!("failed to open source database at {path:?}"))
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn config_is_accepted_after_the_subcommand() {
    let cli = Cli::try_parse_from(["marquee", "incremental", "--config", "x.toml"]).unwrap();
    assert_eq!(cli.config, PathBuf::from("x.toml"));
    assert!(matches!(cli.command, Command::Incremental));
  }

  #[test]
  fn validate_takes_days_and_json() {
    let cli = Cli::try_parse_from(["marquee", "validate", "--days", "7", "--json"]).unwrap();
    assert!(cli.json);
    assert!(matches!(cli.command, Command::Validate { days: 7 }));
    assert_eq!(cli.config, PathBuf::from("marquee.toml"));
  }
}
