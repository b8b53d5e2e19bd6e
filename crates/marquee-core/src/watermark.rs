//! Per-table synchronisation watermarks.
//!
//! A watermark is the timestamp of the last successful sync boundary for one
//! source table. It is the only state used to bound "what changed" queries,
//! and it only ever moves forward.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{bridge::BridgeKind, dimension::DimensionKind, fact::FactKind};

// ─── Managed tables ──────────────────────────────────────────────────────────

/// A source table whose synchronisation progress is tracked in `sync_state`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
  Customer,
  Store,
  Film,
  Actor,
  Category,
  FilmActor,
  FilmCategory,
  Rental,
  Payment,
}

impl SyncTable {
  /// Every managed table, in pipeline phase order.
  pub const ALL: [SyncTable; 9] = [
    Self::Customer,
    Self::Store,
    Self::Film,
    Self::Actor,
    Self::Category,
    Self::FilmActor,
    Self::FilmCategory,
    Self::Rental,
    Self::Payment,
  ];

  /// The `table_name` value stored in `sync_state`.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Customer => "customer",
      Self::Store => "store",
      Self::Film => "film",
      Self::Actor => "actor",
      Self::Category => "category",
      Self::FilmActor => "film_actor",
      Self::FilmCategory => "film_category",
      Self::Rental => "rental",
      Self::Payment => "payment",
    }
  }
}

impl fmt::Display for SyncTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<DimensionKind> for SyncTable {
  fn from(kind: DimensionKind) -> Self {
    match kind {
      DimensionKind::Customer => Self::Customer,
      DimensionKind::Store => Self::Store,
      DimensionKind::Film => Self::Film,
      DimensionKind::Actor => Self::Actor,
      DimensionKind::Category => Self::Category,
    }
  }
}

impl From<BridgeKind> for SyncTable {
  fn from(kind: BridgeKind) -> Self {
    match kind {
      BridgeKind::FilmActor => Self::FilmActor,
      BridgeKind::FilmCategory => Self::FilmCategory,
    }
  }
}

impl From<FactKind> for SyncTable {
  fn from(kind: FactKind) -> Self {
    match kind {
      FactKind::Rental => Self::Rental,
      FactKind::Payment => Self::Payment,
    }
  }
}

// ─── Watermark values ────────────────────────────────────────────────────────

/// The value every watermark is seeded with at `init`. Far enough in the past
/// that the first incremental run catches up on everything after it.
pub fn sentinel() -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2000, 1, 1)
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .unwrap_or(NaiveDateTime::MIN)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sentinel_is_start_of_2000() {
    assert_eq!(sentinel().to_string(), "2000-01-01 00:00:00");
  }

  #[test]
  fn every_kind_maps_to_a_distinct_table() {
    let mut tables: Vec<SyncTable> = DimensionKind::ALL.into_iter().map(Into::into).collect();
    tables.extend(BridgeKind::ALL.into_iter().map(SyncTable::from));
    tables.push(FactKind::Rental.into());
    tables.push(FactKind::Payment.into());
    assert_eq!(tables, SyncTable::ALL);
    assert_eq!(SyncTable::FilmCategory.to_string(), "film_category");
  }
}
