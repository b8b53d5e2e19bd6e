//! Dimension records: the denormalised "who / what / where" tables.
//!
//! Each record is already flattened by the source reader (address → city →
//! country for customers and stores, language name for films), so a
//! dimension row maps one-to-one onto a warehouse row.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ─── Kinds ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
  Customer,
  Store,
  Film,
  Actor,
  Category,
}

impl DimensionKind {
  /// Load order within the dimension phase.
  pub const ALL: [DimensionKind; 5] = [
    Self::Customer,
    Self::Store,
    Self::Film,
    Self::Actor,
    Self::Category,
  ];

  /// Warehouse table holding this dimension.
  pub fn table(self) -> &'static str {
    match self {
      Self::Customer => "dim_customer",
      Self::Store => "dim_store",
      Self::Film => "dim_film",
      Self::Actor => "dim_actor",
      Self::Category => "dim_category",
    }
  }

  /// Surrogate-key column.
  pub fn key_column(self) -> &'static str {
    match self {
      Self::Customer => "customer_key",
      Self::Store => "store_key",
      Self::Film => "film_key",
      Self::Actor => "actor_key",
      Self::Category => "category_key",
    }
  }

  /// Natural-key column; same name on the source and the warehouse side.
  pub fn natural_column(self) -> &'static str {
    match self {
      Self::Customer => "customer_id",
      Self::Store => "store_id",
      Self::Film => "film_id",
      Self::Actor => "actor_id",
      Self::Category => "category_id",
    }
  }
}

impl fmt::Display for DimensionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.table())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDim {
  pub customer_id: i64,
  pub first_name:  String,
  pub last_name:   String,
  pub active:      bool,
  pub city:        String,
  pub country:     String,
  pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDim {
  pub store_id:    i64,
  pub city:        String,
  pub country:     String,
  pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDim {
  pub film_id:      i64,
  pub title:        String,
  pub rating:       Option<String>,
  /// Running time in minutes.
  pub length:       Option<i64>,
  pub language:     String,
  pub release_year: Option<i64>,
  pub last_update:  NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDim {
  pub actor_id:    i64,
  pub first_name:  String,
  pub last_name:   String,
  pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDim {
  pub category_id: i64,
  pub name:        String,
  pub last_update: NaiveDateTime,
}

/// One flattened source row destined for a dimension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimensionRow {
  Customer(CustomerDim),
  Store(StoreDim),
  Film(FilmDim),
  Actor(ActorDim),
  Category(CategoryDim),
}

impl DimensionRow {
  pub fn kind(&self) -> DimensionKind {
    match self {
      Self::Customer(_) => DimensionKind::Customer,
      Self::Store(_) => DimensionKind::Store,
      Self::Film(_) => DimensionKind::Film,
      Self::Actor(_) => DimensionKind::Actor,
      Self::Category(_) => DimensionKind::Category,
    }
  }

  /// The source primary key.
  pub fn natural_key(&self) -> i64 {
    match self {
      Self::Customer(c) => c.customer_id,
      Self::Store(s) => s.store_id,
      Self::Film(f) => f.film_id,
      Self::Actor(a) => a.actor_id,
      Self::Category(c) => c.category_id,
    }
  }
}
