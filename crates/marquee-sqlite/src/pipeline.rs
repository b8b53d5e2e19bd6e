//! The four pipeline commands: `init`, `full_load`, `incremental` and
//! `validate`.
//!
//! Source reads always happen before the warehouse write transaction opens.
//! No lock is taken, so two sync runs against the same warehouse at once are
//! not supported.

use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use marquee_core::{
  calendar::{PopulateOutcome, date_rows},
  keys::KeyMaps,
  source::SourceReader,
  sync::{
    RunSummary, SourceBatch, advance_watermarks, apply_bridges, apply_dimensions,
    apply_facts, apply_incremental, read_watermarks,
  },
  validate::{ValidationReport, compare},
  warehouse::WarehouseTx as _,
};

use crate::{Error, Result, SqliteWarehouse};

/// Inclusive span of calendar days loaded into `dim_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl Default for DateRange {
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap_or(NaiveDate::MIN),
      end:   NaiveDate::from_ymd_opt(2006, 12, 31).unwrap_or(NaiveDate::MAX),
    }
  }
}

/// What `init` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
  pub dates:  PopulateOutcome,
  /// Watermark rows seeded with the sentinel; zero on a re-run.
  pub seeded: usize,
}

fn source_error<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Source(Box::new(e))
}

// ─── init ────────────────────────────────────────────────────────────────────

/// Populate the date dimension, seed watermarks and create fact indexes.
///
/// Safe to run any number of times: an already-populated calendar is
/// reported, never an error, and existing watermarks are left alone.
pub async fn init(warehouse: &SqliteWarehouse, range: DateRange) -> Result<InitReport> {
  let rows = date_rows(range.start, range.end)?;
  let dates = warehouse.populate_dates(rows).await?;
  let seeded = warehouse.seed_watermarks().await?;
  warehouse.create_indexes().await?;
  info!(seeded, "warehouse initialised");
  Ok(InitReport { dates, seeded })
}

// ─── full load ───────────────────────────────────────────────────────────────

/// Load the entire source into the warehouse.
///
/// With `force`, every warehouse table is dropped first. Each phase commits
/// in its own transaction, and every watermark is stamped with `run_at`,
/// which the caller takes before any source read.
pub async fn full_load<S: SourceReader>(
  source: &S,
  warehouse: &SqliteWarehouse,
  force: bool,
  range: DateRange,
  run_at: NaiveDateTime,
) -> Result<RunSummary> {
  if force {
    warn!("dropping every warehouse table before full load");
    warehouse.reset().await?;
  }
  init(warehouse, range).await?;

  let batch = Arc::new(SourceBatch::read(source, None).await.map_err(source_error)?);
  let mut summary = RunSummary::default();

  let phase = Arc::clone(&batch);
  summary.merge(
    warehouse
      .transaction(move |tx| {
        let mut keys = KeyMaps::default();
        let mut stats = RunSummary::default();
        apply_dimensions(tx, &phase, &mut keys, &mut stats)?;
        Ok(stats)
      })
      .await?,
  );

  let phase = Arc::clone(&batch);
  summary.merge(
    warehouse
      .transaction(move |tx| {
        let keys = KeyMaps::load(tx)?;
        let mut stats = RunSummary::default();
        apply_bridges(tx, &phase, &keys, &mut stats)?;
        Ok(stats)
      })
      .await?,
  );

  summary.merge(
    warehouse
      .transaction(move |tx| {
        let keys = KeyMaps::load(tx)?;
        let dates = tx.date_lookup()?;
        let mut stats = RunSummary::default();
        apply_facts(tx, &batch, &keys, &dates, &mut stats)?;
        Ok(stats)
      })
      .await?,
  );

  warehouse
    .transaction(move |tx| advance_watermarks(tx, run_at))
    .await?;

  info!(changed = summary.total_changed(), %run_at, "full load complete");
  Ok(summary)
}

// ─── incremental ─────────────────────────────────────────────────────────────

/// Apply every source change since the last recorded watermarks.
///
/// All writes, including the watermark advance to `run_at`, commit together
/// or not at all. Fails with a missing-watermark error if `init` has never
/// run against this warehouse.
pub async fn incremental<S: SourceReader>(
  source: &S,
  warehouse: &SqliteWarehouse,
  run_at: NaiveDateTime,
) -> Result<RunSummary> {
  let marks = warehouse.transaction(|tx| read_watermarks(tx)).await?;
  for (table, at) in &marks {
    debug!(%table, %at, "scanning from watermark");
  }

  let batch = SourceBatch::read(source, Some(&marks))
    .await
    .map_err(source_error)?;

  let summary = warehouse
    .transaction(move |tx| apply_incremental(tx, &batch, run_at))
    .await?;

  info!(changed = summary.total_changed(), %run_at, "incremental sync complete");
  Ok(summary)
}

// ─── validate ────────────────────────────────────────────────────────────────

/// Compare source and warehouse aggregates over the last `days` days,
/// counting back from `today`.
pub async fn validate<S: SourceReader>(
  source: &S,
  warehouse: &SqliteWarehouse,
  days: u32,
  today: NaiveDate,
) -> Result<ValidationReport> {
  let window_start = today
    .checked_sub_days(Days::new(u64::from(days)))
    .unwrap_or(NaiveDate::MIN);
  info!(days, %window_start, "validating warehouse against source");

  let source_figures = source.figures(window_start).await.map_err(source_error)?;
  let warehouse_figures = warehouse.figures(window_start).await?;

  let report = compare(days, &source_figures, &warehouse_figures);
  for check in &report.checks {
    if check.passed {
      info!(
        check = check.name,
        source = %check.source,
        warehouse = %check.warehouse,
        "check passed"
      );
    } else {
      warn!(
        check = check.name,
        source = %check.source,
        warehouse = %check.warehouse,
        "check failed"
      );
    }
  }
  Ok(report)
}
