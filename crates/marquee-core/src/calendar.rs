//! The date dimension.
//!
//! Every attribute of a [`DateRow`] is a pure function of the calendar date,
//! so the table is generated once over a fixed range and never touched again.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRow {
  /// `YYYYMMDD` as an integer.
  pub date_key:     i64,
  pub date:         NaiveDate,
  pub year:         i32,
  pub quarter:      u32,
  pub month:        u32,
  pub day_of_month: u32,
  /// 0 = Monday … 6 = Sunday.
  pub day_of_week:  u32,
  pub is_weekend:   bool,
}

impl DateRow {
  pub fn new(date: NaiveDate) -> Self {
    let weekday = date.weekday();
    Self {
      date_key: date_key(date),
      date,
      year: date.year(),
      quarter: (date.month() - 1) / 3 + 1,
      month: date.month(),
      day_of_month: date.day(),
      day_of_week: weekday.num_days_from_monday(),
      is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
    }
  }
}

/// `YYYYMMDD` encoding of `date`.
pub fn date_key(date: NaiveDate) -> i64 {
  i64::from(date.year()) * 10_000
    + i64::from(date.month()) * 100
    + i64::from(date.day())
}

/// One row per day in `start..=end`.
pub fn date_rows(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateRow>> {
  if start > end {
    return Err(Error::InvalidDateRange { start, end });
  }
  Ok(start.iter_days().take_while(|d| *d <= end).map(DateRow::new).collect())
}

/// Outcome of a bulk date-dimension insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateOutcome {
  Inserted(usize),
  /// Some date in the range was already present; nothing was written.
  AlreadyPopulated,
}

/// Calendar date → date key, as read back from the warehouse.
///
/// Lookups go through this map rather than [`date_key`] so a fact whose date
/// falls outside the populated range gets a null key instead of a dangling
/// one.
#[derive(Debug, Clone, Default)]
pub struct DateLookup {
  keys: HashMap<NaiveDate, i64>,
}

impl DateLookup {
  pub fn new(keys: HashMap<NaiveDate, i64>) -> Self { Self { keys } }

  pub fn key_for(&self, date: NaiveDate) -> Option<i64> {
    self.keys.get(&date).copied()
  }

  pub fn len(&self) -> usize { self.keys.len() }

  pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn derived_attributes() {
    // 2005-05-28 was a Saturday.
    let row = DateRow::new(d(2005, 5, 28));
    assert_eq!(row.date_key, 20050528);
    assert_eq!(row.year, 2005);
    assert_eq!(row.quarter, 2);
    assert_eq!(row.month, 5);
    assert_eq!(row.day_of_month, 28);
    assert_eq!(row.day_of_week, 5);
    assert!(row.is_weekend);

    let monday = DateRow::new(d(2005, 5, 30));
    assert_eq!(monday.day_of_week, 0);
    assert!(!monday.is_weekend);
  }

  #[test]
  fn quarters_split_on_month_boundaries() {
    let quarters: Vec<_> =
      (1..=12).map(|m| DateRow::new(d(2006, m, 1)).quarter).collect();
    assert_eq!(quarters, [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
  }

  #[test]
  fn range_is_inclusive() {
    let rows = date_rows(d(2005, 1, 1), d(2006, 12, 31)).unwrap();
    assert_eq!(rows.len(), 730);
    assert_eq!(rows.first().unwrap().date_key, 20050101);
    assert_eq!(rows.last().unwrap().date_key, 20061231);

    assert_eq!(date_rows(d(2006, 3, 1), d(2006, 3, 1)).unwrap().len(), 1);
  }

  #[test]
  fn inverted_range_is_an_error() {
    assert!(matches!(
      date_rows(d(2006, 1, 2), d(2006, 1, 1)),
      Err(Error::InvalidDateRange { .. })
    ));
  }

  #[test]
  fn lookup_misses_outside_populated_range() {
    let lookup = DateLookup::new(
      date_rows(d(2005, 1, 1), d(2005, 1, 31))
        .unwrap()
        .into_iter()
        .map(|r| (r.date, r.date_key))
        .collect(),
    );
    assert_eq!(lookup.len(), 31);
    assert_eq!(lookup.key_for(d(2005, 1, 15)), Some(20050115));
    assert_eq!(lookup.key_for(d(2005, 2, 1)), None);
  }
}
