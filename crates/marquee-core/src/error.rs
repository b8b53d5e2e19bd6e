//! Error types for `marquee-core`.

use thiserror::Error;

use crate::watermark::SyncTable;

#[derive(Debug, Error)]
pub enum Error {
  #[error("natural key {0} cannot be mapped to a surrogate key")]
  NaturalKeyOutOfRange(i64),

  #[error("no watermark recorded for table {0}; run `init` first")]
  MissingWatermark(SyncTable),

  #[error("invalid date range: {start} is after {end}")]
  InvalidDateRange {
    start: chrono::NaiveDate,
    end:   chrono::NaiveDate,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
