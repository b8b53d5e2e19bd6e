//! The `WarehouseTx` trait: synchronous access to an open warehouse
//! transaction.
//!
//! Synchronisers only ever see this trait. Everything written through it
//! becomes durable when the backend commits the enclosing transaction, and
//! disappears if the transaction is dropped.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::{
  bridge::BridgeRow,
  calendar::DateLookup,
  dimension::{DimensionKind, DimensionRow},
  fact::{FactKind, PaymentFact, RentalFact},
  watermark::SyncTable,
};

pub trait WarehouseTx {
  /// Backend errors must be able to carry core errors raised mid-sync.
  type Error: std::error::Error + Send + Sync + 'static + From<crate::Error>;

  // ── Lookups ───────────────────────────────────────────────────────────

  /// Every natural → surrogate pair currently stored for `kind`.
  fn key_map(&self, kind: DimensionKind) -> Result<HashMap<i64, i64>, Self::Error>;

  /// Calendar date → date key for every populated `dim_date` row.
  fn date_lookup(&self) -> Result<DateLookup, Self::Error>;

  /// Surrogate key of the row with this natural key, if one exists.
  fn find_dimension(
    &self,
    kind: DimensionKind,
    natural: i64,
  ) -> Result<Option<i64>, Self::Error>;

  fn bridge_exists(&self, row: &BridgeRow) -> Result<bool, Self::Error>;

  fn fact_exists(&self, kind: FactKind, natural: i64) -> Result<bool, Self::Error>;

  // ── Writes ────────────────────────────────────────────────────────────

  fn insert_dimension(
    &self,
    surrogate: i64,
    row: &DimensionRow,
  ) -> Result<(), Self::Error>;

  /// Overwrite every non-key attribute of the row matching
  /// `row.natural_key()`. The surrogate key is left alone.
  fn update_dimension(&self, row: &DimensionRow) -> Result<(), Self::Error>;

  fn insert_bridge(&self, row: &BridgeRow) -> Result<(), Self::Error>;

  fn insert_rental(&self, fact: &RentalFact) -> Result<(), Self::Error>;

  fn insert_payment(&self, fact: &PaymentFact) -> Result<(), Self::Error>;

  // ── Watermarks ────────────────────────────────────────────────────────

  fn watermark(&self, table: SyncTable) -> Result<Option<NaiveDateTime>, Self::Error>;

  /// Move `table`'s watermark to `at` unless it is already later.
  fn advance_watermark(
    &self,
    table: SyncTable,
    at: NaiveDateTime,
  ) -> Result<(), Self::Error>;
}
