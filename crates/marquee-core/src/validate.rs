//! Source ↔ warehouse consistency checks.
//!
//! Both sides produce the same [`Figures`]; [`compare`] walks a fixed list of
//! checks and stops at the first mismatch. Nothing here touches a database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Monetary sums closer than this are considered equal.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Aggregates gathered from one side for validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figures {
  pub customer_count:     i64,
  pub film_count:         i64,
  /// Rentals whose rental date falls in the window.
  pub rental_count:       i64,
  /// Sum of payments whose payment date falls in the window.
  pub payment_total:      f64,
  /// Windowed rental count per store natural key.
  pub rentals_per_store:  BTreeMap<i64, i64>,
  /// Windowed payment sum per store natural key.
  pub payments_per_store: BTreeMap<i64, f64>,
}

/// Result of one named comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
  pub name:      &'static str,
  pub source:    String,
  pub warehouse: String,
  pub passed:    bool,
}

/// The checks that were actually run, in order. A failed check is always the
/// last entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
  pub days:   u32,
  pub checks: Vec<Check>,
}

impl ValidationReport {
  pub fn passed(&self) -> bool { self.checks.iter().all(|c| c.passed) }

  pub fn failed_check(&self) -> Option<&Check> {
    self.checks.iter().find(|c| !c.passed)
  }
}

pub fn amounts_match(a: f64, b: f64) -> bool { (a - b).abs() < AMOUNT_TOLERANCE }

fn money(v: f64) -> String { format!("${v:.2}") }

/// Compare source and warehouse figures, halting at the first mismatch.
///
/// Per-store checks iterate the stores known to the source; a store absent
/// from the warehouse figures counts as zero.
pub fn compare(days: u32, source: &Figures, warehouse: &Figures) -> ValidationReport {
  let mut report = ValidationReport { days, checks: Vec::new() };

  let counts = [
    ("Customer Count", source.customer_count, warehouse.customer_count),
    ("Film Count", source.film_count, warehouse.film_count),
    ("Rental Count", source.rental_count, warehouse.rental_count),
  ];
  for (name, s, w) in counts {
    if !push(&mut report, Check {
      name,
      source: s.to_string(),
      warehouse: w.to_string(),
      passed: s == w,
    }) {
      return report;
    }
  }

  if !push(&mut report, Check {
    name:      "Payment Total",
    source:    money(source.payment_total),
    warehouse: money(warehouse.payment_total),
    passed:    amounts_match(source.payment_total, warehouse.payment_total),
  }) {
    return report;
  }

  let rentals: Vec<_> = source
    .rentals_per_store
    .iter()
    .map(|(store, s)| {
      let w = warehouse.rentals_per_store.get(store).copied().unwrap_or(0);
      (*store, s.to_string(), w.to_string(), *s == w)
    })
    .collect();
  if !push(&mut report, per_store("Per-Store Rental Counts", rentals)) {
    return report;
  }

  let payments: Vec<_> = source
    .payments_per_store
    .iter()
    .map(|(store, s)| {
      let w = warehouse.payments_per_store.get(store).copied().unwrap_or(0.0);
      (*store, money(*s), money(w), amounts_match(*s, w))
    })
    .collect();
  push(&mut report, per_store("Per-Store Payment Totals", payments));

  report
}

fn push(report: &mut ValidationReport, check: Check) -> bool {
  let passed = check.passed;
  report.checks.push(check);
  passed
}

fn per_store(name: &'static str, rows: Vec<(i64, String, String, bool)>) -> Check {
  let mut source = Vec::with_capacity(rows.len());
  let mut warehouse = Vec::with_capacity(rows.len());
  let mut passed = true;
  for (store, s, w, ok) in rows {
    source.push(format!("store {store}={s}"));
    warehouse.push(format!("store {store}={w}"));
    passed &= ok;
  }
  Check {
    name,
    source: source.join(", "),
    warehouse: warehouse.join(", "),
    passed,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn figures() -> Figures {
    Figures {
      customer_count:     2,
      film_count:         3,
      rental_count:       4,
      payment_total:      10.96,
      rentals_per_store:  [(1, 3), (2, 1)].into_iter().collect(),
      payments_per_store: [(1, 7.97), (2, 2.99)].into_iter().collect(),
    }
  }

  #[test]
  fn identical_figures_pass_every_check() {
    let report = compare(30, &figures(), &figures());
    assert!(report.passed());
    assert_eq!(report.checks.len(), 6);
    assert!(report.failed_check().is_none());
  }

  #[test]
  fn rounding_noise_is_tolerated() {
    let mut warehouse = figures();
    warehouse.payment_total += 0.004;
    assert!(compare(30, &figures(), &warehouse).passed());
  }

  #[test]
  fn payment_mismatch_halts_before_per_store_checks() {
    let mut warehouse = figures();
    warehouse.payment_total += 4.99;

    let report = compare(7, &figures(), &warehouse);
    assert!(!report.passed());
    assert_eq!(report.checks.len(), 4);
    assert_eq!(report.failed_check().unwrap().name, "Payment Total");
    assert_eq!(report.checks.last().unwrap().warehouse, "$15.95");
  }

  #[test]
  fn count_mismatch_halts_immediately() {
    let mut warehouse = figures();
    warehouse.customer_count = 1;

    let report = compare(30, &figures(), &warehouse);
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.failed_check().unwrap().name, "Customer Count");
  }

  #[test]
  fn store_missing_from_warehouse_counts_as_zero() {
    let mut warehouse = figures();
    warehouse.rentals_per_store.remove(&2);

    let report = compare(30, &figures(), &warehouse);
    let failed = report.failed_check().unwrap();
    assert_eq!(failed.name, "Per-Store Rental Counts");
    assert_eq!(failed.warehouse, "store 1=3, store 2=0");
  }
}
