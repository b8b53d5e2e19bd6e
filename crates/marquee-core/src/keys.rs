//! Natural-key → surrogate-key mapping.
//!
//! Warehouse dimension keys are derived from the source key
//! (`natural * 100 + 1`) rather than drawn from a sequence, so any surrogate
//! can be reconstructed without a persisted mapping table. [`KeyMaps`] still
//! keeps the mapping in memory so bridge and fact resolution never has to hit
//! the warehouse per row.

use std::collections::HashMap;

use crate::{Error, Result, dimension::DimensionKind, warehouse::WarehouseTx};

/// Largest natural key whose surrogate still fits in an `i64`.
pub const MAX_NATURAL_KEY: i64 = (i64::MAX - 1) / 100;

/// Derive the surrogate key for `natural`.
///
/// The transform is injective over `0..=MAX_NATURAL_KEY`; anything outside
/// that range is rejected rather than allowed to wrap into a collision.
pub fn surrogate_key(natural: i64) -> Result<i64> {
  if natural < 0 {
    return Err(Error::NaturalKeyOutOfRange(natural));
  }
  natural
    .checked_mul(100)
    .and_then(|k| k.checked_add(1))
    .ok_or(Error::NaturalKeyOutOfRange(natural))
}

/// Live natural → surrogate maps for every dimension.
#[derive(Debug, Clone, Default)]
pub struct KeyMaps {
  maps: HashMap<DimensionKind, HashMap<i64, i64>>,
}

impl KeyMaps {
  /// Read every existing dimension row from the warehouse.
  pub fn load<W: WarehouseTx>(tx: &W) -> Result<Self, W::Error> {
    let mut maps = HashMap::new();
    for kind in DimensionKind::ALL {
      maps.insert(kind, tx.key_map(kind)?);
    }
    Ok(Self { maps })
  }

  pub fn resolve(&self, kind: DimensionKind, natural: i64) -> Option<i64> {
    self.maps.get(&kind).and_then(|m| m.get(&natural)).copied()
  }

  /// Record a row inserted mid-run so later steps can resolve it.
  pub fn register(&mut self, kind: DimensionKind, natural: i64, surrogate: i64) {
    self.maps.entry(kind).or_default().insert(natural, surrogate);
  }

  pub fn len(&self, kind: DimensionKind) -> usize {
    self.maps.get(&kind).map_or(0, HashMap::len)
  }

  pub fn is_empty(&self) -> bool { self.maps.values().all(HashMap::is_empty) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn surrogate_is_natural_times_hundred_plus_one() {
    assert_eq!(surrogate_key(0).unwrap(), 1);
    assert_eq!(surrogate_key(1).unwrap(), 101);
    assert_eq!(surrogate_key(599).unwrap(), 59_901);
  }

  #[test]
  fn surrogate_derivation_is_injective_on_a_sample() {
    let keys: std::collections::HashSet<_> =
      (0..10_000).map(|k| surrogate_key(k).unwrap()).collect();
    assert_eq!(keys.len(), 10_000);
  }

  #[test]
  fn out_of_range_natural_keys_are_rejected() {
    assert!(surrogate_key(MAX_NATURAL_KEY).is_ok());
    assert!(matches!(
      surrogate_key(MAX_NATURAL_KEY + 1),
      Err(Error::NaturalKeyOutOfRange(_))
    ));
    assert!(matches!(
      surrogate_key(-5),
      Err(Error::NaturalKeyOutOfRange(-5))
    ));
  }

  #[test]
  fn registered_keys_resolve() {
    let mut maps = KeyMaps::default();
    assert!(maps.is_empty());

    maps.register(DimensionKind::Film, 7, 701);
    assert_eq!(maps.resolve(DimensionKind::Film, 7), Some(701));
    assert_eq!(maps.resolve(DimensionKind::Actor, 7), None);
    assert_eq!(maps.len(DimensionKind::Film), 1);
    assert!(!maps.is_empty());
  }
}
