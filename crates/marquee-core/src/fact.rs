//! Transaction-grained records: rentals and payments.
//!
//! Facts are insert-only. Once a fact row exists for a natural id it is never
//! rewritten, even if the source row changes afterwards.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
  Rental,
  Payment,
}

impl FactKind {
  pub fn table(self) -> &'static str {
    match self {
      Self::Rental => "fact_rental",
      Self::Payment => "fact_payment",
    }
  }

  pub fn natural_column(self) -> &'static str {
    match self {
      Self::Rental => "rental_id",
      Self::Payment => "payment_id",
    }
  }
}

// ─── Source side ─────────────────────────────────────────────────────────────

/// A source rental joined with its inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRental {
  pub rental_id:   i64,
  pub rental_date: NaiveDateTime,
  pub return_date: Option<NaiveDateTime>,
  pub customer_id: i64,
  pub staff_id:    i64,
  pub film_id:     i64,
  pub store_id:    i64,
}

/// A source payment joined with the staff member who took it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayment {
  pub payment_id:   i64,
  pub payment_date: NaiveDateTime,
  pub customer_id:  i64,
  pub staff_id:     i64,
  /// Store of the staff member, not of the customer.
  pub store_id:     i64,
  pub amount:       f64,
}

// ─── Warehouse side ──────────────────────────────────────────────────────────

/// A `fact_rental` row. Every foreign key is nullable: an unresolved
/// dimension leaves a hole instead of rejecting the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalFact {
  pub rental_id:            i64,
  pub date_key_rented:      Option<i64>,
  pub date_key_returned:    Option<i64>,
  pub film_key:             Option<i64>,
  pub store_key:            Option<i64>,
  pub customer_key:         Option<i64>,
  pub staff_id:             i64,
  pub rental_duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFact {
  pub payment_id:    i64,
  pub date_key_paid: Option<i64>,
  pub customer_key:  Option<i64>,
  pub store_key:     Option<i64>,
  pub staff_id:      i64,
  pub amount:        f64,
}

/// Whole days between rental and return, rounded towards negative infinity.
/// `None` while the rental is still out.
pub fn rental_duration_days(
  rented: NaiveDateTime,
  returned: Option<NaiveDateTime>,
) -> Option<i64> {
  returned.map(|r| (r - rented).num_seconds().div_euclid(86_400))
}

/// Calendar date of a timestamp, time of day discarded.
pub fn calendar_date(ts: NaiveDateTime) -> NaiveDate { ts.date() }

#[cfg(test)]
mod tests {
  use super::*;

  fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
  }

  #[test]
  fn duration_counts_whole_days() {
    let rented = ts("2005-05-24 22:53:30");
    assert_eq!(
      rental_duration_days(rented, Some(ts("2005-05-26 22:04:30"))),
      Some(1)
    );
    assert_eq!(
      rental_duration_days(rented, Some(ts("2005-05-28 22:53:30"))),
      Some(4)
    );
  }

  #[test]
  fn duration_is_none_while_rented_out() {
    assert_eq!(rental_duration_days(ts("2005-05-24 22:53:30"), None), None);
  }

  #[test]
  fn negative_duration_floors() {
    let rented = ts("2005-05-24 12:00:00");
    assert_eq!(
      rental_duration_days(rented, Some(ts("2005-05-24 06:00:00"))),
      Some(-1)
    );
  }
}
