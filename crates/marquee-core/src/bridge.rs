//! Many-to-many associations between dimensions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dimension::DimensionKind;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BridgeKind {
  FilmActor,
  FilmCategory,
}

impl BridgeKind {
  pub const ALL: [BridgeKind; 2] = [Self::FilmActor, Self::FilmCategory];

  pub fn table(self) -> &'static str {
    match self {
      Self::FilmActor => "bridge_film_actor",
      Self::FilmCategory => "bridge_film_category",
    }
  }

  /// The dimension on the non-film side of the association.
  pub fn other(self) -> DimensionKind {
    match self {
      Self::FilmActor => DimensionKind::Actor,
      Self::FilmCategory => DimensionKind::Category,
    }
  }
}

impl fmt::Display for BridgeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.table())
  }
}

/// One source `film_actor` / `film_category` row, in natural keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
  pub kind:     BridgeKind,
  pub film_id:  i64,
  /// `actor_id` or `category_id`, depending on `kind`.
  pub other_id: i64,
}

/// A resolved bridge row: both endpoints as surrogate keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeRow {
  pub kind:      BridgeKind,
  pub film_key:  i64,
  pub other_key: i64,
}
