//! Runtime settings, read from `marquee.toml` and `MARQUEE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use marquee_sqlite::pipeline::DateRange;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
  /// Sakila-schema operational database, opened read-only.
  pub source_path:      PathBuf,
  /// Analytics database; created on first use.
  pub warehouse_path:   PathBuf,
  pub date_range_start: NaiveDate,
  pub date_range_end:   NaiveDate,
}

impl Default for WarehouseConfig {
  fn default() -> Self {
    let range = DateRange::default();
    Self {
      source_path:      PathBuf::from("sakila.db"),
      warehouse_path:   PathBuf::from("analytics.db"),
      date_range_start: range.start,
      date_range_end:   range.end,
    }
  }
}

impl WarehouseConfig {
  pub fn date_range(&self) -> DateRange {
    DateRange { start: self.date_range_start, end: self.date_range_end }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
