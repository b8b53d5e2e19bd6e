//! Dimension, bridge and fact synchronisers.
//!
//! A run is split into ordered phases: dimensions, then bridges, then facts,
//! then watermark advancement. Bridges and facts resolve their foreign keys
//! through the [`KeyMaps`] populated by the dimension phase, so the order is
//! load-bearing. The functions here only stage writes through a
//! [`WarehouseTx`]; committing is the caller's job.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  Error,
  bridge::{Association, BridgeKind, BridgeRow},
  calendar::DateLookup,
  dimension::{DimensionKind, DimensionRow},
  fact::{
    FactKind, PaymentFact, RentalFact, SourcePayment, SourceRental, calendar_date,
    rental_duration_days,
  },
  keys::{KeyMaps, surrogate_key},
  source::SourceReader,
  warehouse::WarehouseTx,
  watermark::SyncTable,
};

// ─── Statistics ──────────────────────────────────────────────────────────────

/// What happened to the rows scanned for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
  pub scanned:  usize,
  pub inserted: usize,
  pub updated:  usize,
  /// Already present (bridges, facts) or unresolvable (bridges).
  pub skipped:  usize,
}

impl TableStats {
  pub fn changed(&self) -> usize { self.inserted + self.updated }
}

/// Per-table statistics for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
  pub tables: BTreeMap<SyncTable, TableStats>,
}

impl RunSummary {
  pub fn get(&self, table: SyncTable) -> TableStats {
    self.tables.get(&table).copied().unwrap_or_default()
  }

  pub fn total_changed(&self) -> usize {
    self.tables.values().map(TableStats::changed).sum()
  }

  /// Fold another phase's statistics into this summary.
  pub fn merge(&mut self, other: RunSummary) { self.tables.extend(other.tables); }

  fn record(&mut self, table: SyncTable, stats: TableStats) {
    info!(
      table = %table,
      scanned = stats.scanned,
      inserted = stats.inserted,
      updated = stats.updated,
      skipped = stats.skipped,
      "table synchronised"
    );
    self.tables.insert(table, stats);
  }
}

// ─── Source batch ────────────────────────────────────────────────────────────

/// Per-table lower bounds for a source scan. An empty set means "scan
/// everything".
pub type Watermarks = BTreeMap<SyncTable, NaiveDateTime>;

/// Everything read from the source for one run.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
  pub dimensions:   Vec<(DimensionKind, Vec<DimensionRow>)>,
  pub associations: Vec<(BridgeKind, Vec<Association>)>,
  pub rentals:      Vec<SourceRental>,
  pub payments:     Vec<SourcePayment>,
}

impl SourceBatch {
  /// Scan the source. `watermarks` of `None` is a full load.
  pub async fn read<S: SourceReader>(
    source: &S,
    watermarks: Option<&Watermarks>,
  ) -> Result<Self, S::Error> {
    let since = |table: SyncTable| watermarks.and_then(|w| w.get(&table)).copied();

    let mut batch = Self::default();
    for kind in DimensionKind::ALL {
      let rows = source.dimension_rows(kind, since(kind.into())).await?;
      batch.dimensions.push((kind, rows));
    }
    for kind in BridgeKind::ALL {
      let rows = source.associations(kind, since(kind.into())).await?;
      batch.associations.push((kind, rows));
    }
    batch.rentals = source.rentals(since(SyncTable::Rental)).await?;
    batch.payments = source.payments(since(SyncTable::Payment)).await?;
    Ok(batch)
  }
}

// ─── Watermarks ──────────────────────────────────────────────────────────────

/// Read every managed watermark; a missing row is an error.
pub fn read_watermarks<W: WarehouseTx>(tx: &W) -> Result<Watermarks, W::Error> {
  let mut marks = Watermarks::new();
  for table in SyncTable::ALL {
    let at = tx.watermark(table)?.ok_or(Error::MissingWatermark(table))?;
    marks.insert(table, at);
  }
  Ok(marks)
}

/// Stage a forward-only advance of every managed watermark to `run_at`.
pub fn advance_watermarks<W: WarehouseTx>(
  tx: &W,
  run_at: NaiveDateTime,
) -> Result<(), W::Error> {
  for table in SyncTable::ALL {
    tx.advance_watermark(table, run_at)?;
  }
  Ok(())
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// Insert-or-overwrite every row of one dimension.
///
/// Existing rows (matched by natural key) keep their surrogate key and have
/// all other attributes replaced. New rows get a derived surrogate key and
/// are registered in `keys` immediately.
pub fn sync_dimension<W: WarehouseTx>(
  tx: &W,
  rows: &[DimensionRow],
  keys: &mut KeyMaps,
) -> Result<TableStats, W::Error> {
  let mut stats = TableStats { scanned: rows.len(), ..Default::default() };

  for row in rows {
    let kind = row.kind();
    let natural = row.natural_key();

    match tx.find_dimension(kind, natural)? {
      Some(existing) => {
        tx.update_dimension(row)?;
        keys.register(kind, natural, existing);
        stats.updated += 1;
      }
      None => {
        let surrogate = surrogate_key(natural)?;
        tx.insert_dimension(surrogate, row)?;
        keys.register(kind, natural, surrogate);
        debug!(%kind, natural, surrogate, "inserted dimension row");
        stats.inserted += 1;
      }
    }
  }

  Ok(stats)
}

/// Dimension phase for a whole batch.
pub fn apply_dimensions<W: WarehouseTx>(
  tx: &W,
  batch: &SourceBatch,
  keys: &mut KeyMaps,
  summary: &mut RunSummary,
) -> Result<(), W::Error> {
  for (kind, rows) in &batch.dimensions {
    let stats = sync_dimension(tx, rows, keys)?;
    summary.record((*kind).into(), stats);
  }
  Ok(())
}

// ─── Bridges ─────────────────────────────────────────────────────────────────

/// Insert every association whose endpoints are both known and which is not
/// already present.
///
/// An association referencing a dimension row that has not been synchronised
/// yet is dropped without complaint; it is picked up again only if its own
/// source row is rescanned by a later run.
pub fn sync_bridge<W: WarehouseTx>(
  tx: &W,
  associations: &[Association],
  keys: &KeyMaps,
) -> Result<TableStats, W::Error> {
  let mut stats = TableStats { scanned: associations.len(), ..Default::default() };

  for assoc in associations {
    let film_key = keys.resolve(DimensionKind::Film, assoc.film_id);
    let other_key = keys.resolve(assoc.kind.other(), assoc.other_id);

    let (Some(film_key), Some(other_key)) = (film_key, other_key) else {
      stats.skipped += 1;
      continue;
    };

    let row = BridgeRow { kind: assoc.kind, film_key, other_key };
    if tx.bridge_exists(&row)? {
      stats.skipped += 1;
      continue;
    }
    tx.insert_bridge(&row)?;
    stats.inserted += 1;
  }

  Ok(stats)
}

pub fn apply_bridges<W: WarehouseTx>(
  tx: &W,
  batch: &SourceBatch,
  keys: &KeyMaps,
  summary: &mut RunSummary,
) -> Result<(), W::Error> {
  for (kind, associations) in &batch.associations {
    let stats = sync_bridge(tx, associations, keys)?;
    summary.record((*kind).into(), stats);
  }
  Ok(())
}

// ─── Facts ───────────────────────────────────────────────────────────────────

/// Build the warehouse row for a rental. Unresolved keys become `None`.
pub fn rental_fact(
  rental: &SourceRental,
  keys: &KeyMaps,
  dates: &DateLookup,
) -> RentalFact {
  RentalFact {
    rental_id:            rental.rental_id,
    date_key_rented:      dates.key_for(calendar_date(rental.rental_date)),
    date_key_returned:    rental
      .return_date
      .and_then(|r| dates.key_for(calendar_date(r))),
    film_key:             keys.resolve(DimensionKind::Film, rental.film_id),
    store_key:            keys.resolve(DimensionKind::Store, rental.store_id),
    customer_key:         keys.resolve(DimensionKind::Customer, rental.customer_id),
    staff_id:             rental.staff_id,
    rental_duration_days: rental_duration_days(rental.rental_date, rental.return_date),
  }
}

pub fn payment_fact(
  payment: &SourcePayment,
  keys: &KeyMaps,
  dates: &DateLookup,
) -> PaymentFact {
  PaymentFact {
    payment_id:    payment.payment_id,
    date_key_paid: dates.key_for(calendar_date(payment.payment_date)),
    customer_key:  keys.resolve(DimensionKind::Customer, payment.customer_id),
    store_key:     keys.resolve(DimensionKind::Store, payment.store_id),
    staff_id:      payment.staff_id,
    amount:        payment.amount,
  }
}

/// Insert rentals not yet in the warehouse. Existing facts are never touched.
pub fn sync_rentals<W: WarehouseTx>(
  tx: &W,
  rentals: &[SourceRental],
  keys: &KeyMaps,
  dates: &DateLookup,
) -> Result<TableStats, W::Error> {
  let mut stats = TableStats { scanned: rentals.len(), ..Default::default() };
  for rental in rentals {
    if tx.fact_exists(FactKind::Rental, rental.rental_id)? {
      stats.skipped += 1;
      continue;
    }
    tx.insert_rental(&rental_fact(rental, keys, dates))?;
    stats.inserted += 1;
  }
  Ok(stats)
}

pub fn sync_payments<W: WarehouseTx>(
  tx: &W,
  payments: &[SourcePayment],
  keys: &KeyMaps,
  dates: &DateLookup,
) -> Result<TableStats, W::Error> {
  let mut stats = TableStats { scanned: payments.len(), ..Default::default() };
  for payment in payments {
    if tx.fact_exists(FactKind::Payment, payment.payment_id)? {
      stats.skipped += 1;
      continue;
    }
    tx.insert_payment(&payment_fact(payment, keys, dates))?;
    stats.inserted += 1;
  }
  Ok(stats)
}

pub fn apply_facts<W: WarehouseTx>(
  tx: &W,
  batch: &SourceBatch,
  keys: &KeyMaps,
  dates: &DateLookup,
  summary: &mut RunSummary,
) -> Result<(), W::Error> {
  let stats = sync_rentals(tx, &batch.rentals, keys, dates)?;
  summary.record(SyncTable::Rental, stats);
  let stats = sync_payments(tx, &batch.payments, keys, dates)?;
  summary.record(SyncTable::Payment, stats);
  Ok(())
}

// ─── Incremental run ─────────────────────────────────────────────────────────

/// Apply a delta batch inside a single transaction: load the key maps, run
/// every phase in order, then advance all watermarks to `run_at`.
pub fn apply_incremental<W: WarehouseTx>(
  tx: &W,
  batch: &SourceBatch,
  run_at: NaiveDateTime,
) -> Result<RunSummary, W::Error> {
  let mut keys = KeyMaps::load(tx)?;
  let dates = tx.date_lookup()?;
  debug!(
    films = keys.len(DimensionKind::Film),
    customers = keys.len(DimensionKind::Customer),
    dates = dates.len(),
    "loaded warehouse key maps"
  );
  let mut summary = RunSummary::default();

  apply_dimensions(tx, batch, &mut keys, &mut summary)?;
  apply_bridges(tx, batch, &keys, &mut summary)?;
  apply_facts(tx, batch, &keys, &dates, &mut summary)?;
  advance_watermarks(tx, run_at)?;

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
  }

  fn maps() -> KeyMaps {
    let mut keys = KeyMaps::default();
    keys.register(DimensionKind::Film, 1, 101);
    keys.register(DimensionKind::Store, 2, 201);
    keys
  }

  fn dates() -> DateLookup {
    let day = NaiveDate::from_ymd_opt(2005, 5, 24).unwrap();
    DateLookup::new([(day, 20050524)].into_iter().collect())
  }

  #[test]
  fn rental_fact_nulls_unresolved_keys() {
    let rental = SourceRental {
      rental_id:   10,
      rental_date: ts("2005-05-24 22:53:30"),
      return_date: Some(ts("2005-05-26 22:04:30")),
      customer_id: 99,
      staff_id:    1,
      film_id:     1,
      store_id:    2,
    };

    let fact = rental_fact(&rental, &maps(), &dates());
    assert_eq!(fact.film_key, Some(101));
    assert_eq!(fact.store_key, Some(201));
    assert_eq!(fact.customer_key, None);
    assert_eq!(fact.date_key_rented, Some(20050524));
    // 2005-05-26 is outside the populated lookup.
    assert_eq!(fact.date_key_returned, None);
    assert_eq!(fact.rental_duration_days, Some(1));
    assert_eq!(fact.staff_id, 1);
  }

  #[test]
  fn payment_fact_carries_amount_and_staff() {
    let payment = SourcePayment {
      payment_id:   5,
      payment_date: ts("2005-05-24 23:03:39"),
      customer_id:  1,
      staff_id:     2,
      store_id:     2,
      amount:       2.99,
    };

    let fact = payment_fact(&payment, &maps(), &dates());
    assert_eq!(fact.date_key_paid, Some(20050524));
    assert_eq!(fact.store_key, Some(201));
    assert_eq!(fact.customer_key, None);
    assert_eq!(fact.staff_id, 2);
    assert!((fact.amount - 2.99).abs() < f64::EPSILON);
  }

  #[test]
  fn summary_totals() {
    let mut summary = RunSummary::default();
    summary.record(
      SyncTable::Customer,
      TableStats { scanned: 3, inserted: 1, updated: 2, skipped: 0 },
    );
    summary.record(
      SyncTable::FilmActor,
      TableStats { scanned: 4, inserted: 1, updated: 0, skipped: 3 },
    );
    assert_eq!(summary.total_changed(), 4);
    assert_eq!(summary.get(SyncTable::Payment), TableStats::default());
  }

  #[test]
  fn summary_serialises_by_table_name() {
    let mut summary = RunSummary::default();
    summary.merge(RunSummary {
      tables: [(
        SyncTable::FilmCategory,
        TableStats { scanned: 2, inserted: 2, ..Default::default() },
      )]
      .into_iter()
      .collect(),
    });

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["tables"]["film_category"]["inserted"], 2);
    assert_eq!(json["tables"]["film_category"]["skipped"], 0);
  }
}
