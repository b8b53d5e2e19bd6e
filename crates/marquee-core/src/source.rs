//! The `SourceReader` trait: read-only access to the operational database.
//!
//! Every query takes an optional watermark. `None` means "all rows" (full
//! load); `Some(ts)` restricts the scan to rows whose delta marker is strictly
//! later than `ts`. Dimensions and bridges use their `last_update` column;
//! rentals use `rental_date` and payments use `payment_date`.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
  bridge::{Association, BridgeKind},
  dimension::{DimensionKind, DimensionRow},
  fact::{SourcePayment, SourceRental},
  validate::Figures,
};

pub trait SourceReader: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Flattened rows for one dimension, parents already joined in.
  fn dimension_rows(
    &self,
    kind: DimensionKind,
    since: Option<NaiveDateTime>,
  ) -> impl Future<Output = Result<Vec<DimensionRow>, Self::Error>> + Send + '_;

  fn associations(
    &self,
    kind: BridgeKind,
    since: Option<NaiveDateTime>,
  ) -> impl Future<Output = Result<Vec<Association>, Self::Error>> + Send + '_;

  /// Rentals joined with inventory for their film and store.
  fn rentals(
    &self,
    since: Option<NaiveDateTime>,
  ) -> impl Future<Output = Result<Vec<SourceRental>, Self::Error>> + Send + '_;

  /// Payments joined with staff for the store that took them.
  fn payments(
    &self,
    since: Option<NaiveDateTime>,
  ) -> impl Future<Output = Result<Vec<SourcePayment>, Self::Error>> + Send + '_;

  /// Aggregates for validation. Windowed figures cover calendar dates on or
  /// after `window_start`.
  fn figures(
    &self,
    window_start: NaiveDate,
  ) -> impl Future<Output = Result<Figures, Self::Error>> + Send + '_;
}
