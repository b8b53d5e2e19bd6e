//! Conversions between chrono values and the text stored in SQLite columns.
//!
//! Timestamps are written as `YYYY-MM-DD HH:MM:SS`, the same shape the Sakila
//! source uses, so `julianday()` and plain text comparison agree. Dates are
//! written as `YYYY-MM-DD`.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Row, types::Type};

use crate::{Error, Result};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Sub-second precision is dropped. A truncated watermark only ever causes a
/// row to be rescanned, never skipped.
pub fn encode_ts(ts: NaiveDateTime) -> String { ts.format(TS_FORMAT).to_string() }

pub fn decode_ts(s: &str) -> Result<NaiveDateTime> {
  let s = s.trim();
  ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .or_else(|| {
      NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .ok_or_else(|| Error::DateParse(format!("unrecognised timestamp: {s:?}")))
}

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row accessors ───────────────────────────────────────────────────────────

fn conversion_failure(idx: usize, e: Error) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Read column `idx` as a timestamp inside a rusqlite row mapper.
pub fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
  let raw: String = row.get(idx)?;
  decode_ts(&raw).map_err(|e| conversion_failure(idx, e))
}

pub fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
  let raw: Option<String> = row.get(idx)?;
  raw
    .as_deref()
    .map(decode_ts)
    .transpose()
    .map_err(|e| conversion_failure(idx, e))
}

pub fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
  let raw: String = row.get(idx)?;
  decode_date(&raw).map_err(|e| conversion_failure(idx, e))
}
