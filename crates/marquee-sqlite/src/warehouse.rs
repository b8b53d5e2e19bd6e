//! [`SqliteWarehouse`], the analytics database, and [`WarehouseConn`], its
//! implementation of [`WarehouseTx`].

use std::{
  collections::{BTreeMap, HashMap},
  path::Path,
};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{ErrorCode, OpenFlags, OptionalExtension as _, params};
use tracing::{info, warn};

use marquee_core::{
  bridge::BridgeRow,
  calendar::{DateLookup, DateRow, PopulateOutcome},
  dimension::{DimensionKind, DimensionRow},
  fact::{FactKind, PaymentFact, RentalFact},
  validate::Figures,
  warehouse::WarehouseTx,
  watermark::{SyncTable, sentinel},
};

use crate::{
  Error, Result,
  encode::{date_at, encode_date, encode_ts, ts_at},
  schema::{DROP_ALL, FACT_INDEXES, SCHEMA},
};

// ─── Warehouse ───────────────────────────────────────────────────────────────

/// The analytics warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and make sure its tables exist.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let warehouse = Self { conn };
    warehouse.create_schema().await?;
    Ok(warehouse)
  }

  /// Open an existing warehouse at `path` for reading only.
  ///
  /// A missing file is an error and the schema is left untouched.
  pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn })
  }

  /// Open an in-memory warehouse, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let warehouse = Self { conn };
    warehouse.create_schema().await?;
    Ok(warehouse)
  }

  async fn create_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Drop every warehouse table and recreate them empty.
  pub async fn reset(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(DROP_ALL)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside one transaction. The transaction commits if `f` returns
  /// `Ok` and rolls back otherwise.
  pub async fn transaction<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&WarehouseConn<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match f(&WarehouseConn::new(&tx)) {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => {
            warn!("rolling back warehouse transaction: {e}");
            Ok(Err(e))
          }
        }
      })
      .await?
  }

  /// Bulk-insert the date dimension in a single transaction.
  ///
  /// If any date in the batch already exists the whole insert is rolled back
  /// and reported as [`PopulateOutcome::AlreadyPopulated`].
  pub async fn populate_dates(&self, rows: Vec<DateRow>) -> Result<PopulateOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = {
          let mut stmt = tx.prepare(
            "INSERT INTO dim_date (
               date_key, date, year, quarter, month,
               day_of_month, day_of_week, is_weekend
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          let mut inserted = 0;
          for row in &rows {
            let result = stmt.execute(params![
              row.date_key,
              encode_date(row.date),
              row.year,
              row.quarter,
              row.month,
              row.day_of_month,
              row.day_of_week,
              row.is_weekend,
            ]);
            match result {
              Ok(_) => inserted += 1,
              Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
              {
                return Ok(PopulateOutcome::AlreadyPopulated);
              }
              Err(e) => return Err(e.into()),
            }
          }
          inserted
        };
        tx.commit()?;
        Ok(PopulateOutcome::Inserted(inserted))
      })
      .await?;

    match outcome {
      PopulateOutcome::Inserted(n) => info!("populated dim_date with {n} dates"),
      PopulateOutcome::AlreadyPopulated => info!("dim_date already populated"),
    }
    Ok(outcome)
  }

  /// Insert the sentinel watermark for every managed table that has none.
  /// Returns how many rows were seeded; existing rows are left untouched.
  pub async fn seed_watermarks(&self) -> Result<usize> {
    let sentinel_str = encode_ts(sentinel());
    let seeded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut seeded = 0;
        for table in SyncTable::ALL {
          seeded += tx.execute(
            "INSERT OR IGNORE INTO sync_state (table_name, last_sync_timestamp)
             VALUES (?1, ?2)",
            params![table.as_str(), sentinel_str],
          )?;
        }
        tx.commit()?;
        Ok(seeded)
      })
      .await?;
    Ok(seeded)
  }

  pub async fn create_indexes(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(FACT_INDEXES)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Validation aggregates. Windowed figures join facts to `dim_date` and
  /// keep dates on or after `window_start`.
  pub async fn figures(&self, window_start: NaiveDate) -> Result<Figures> {
    let start = encode_date(window_start);
    let figures = self
      .conn
      .call(move |conn| {
        let count = |sql: &str| conn.query_row(sql, [], |r| r.get::<_, i64>(0));

        let customer_count = count("SELECT COUNT(*) FROM dim_customer")?;
        let film_count = count("SELECT COUNT(*) FROM dim_film")?;

        let rental_count: i64 = conn.query_row(
          "SELECT COUNT(f.rental_id)
           FROM fact_rental f
           JOIN dim_date d ON d.date_key = f.date_key_rented
           WHERE d.date >= ?1",
          params![start],
          |r| r.get(0),
        )?;

        let payment_total: f64 = conn.query_row(
          "SELECT COALESCE(SUM(f.amount), 0.0)
           FROM fact_payment f
           JOIN dim_date d ON d.date_key = f.date_key_paid
           WHERE d.date >= ?1",
          params![start],
          |r| r.get(0),
        )?;

        let rentals_per_store: BTreeMap<i64, i64> = conn
          .prepare(
            "SELECT s.store_id, COUNT(f.rental_id)
             FROM dim_store s
             JOIN fact_rental f ON f.store_key = s.store_key
             JOIN dim_date d ON d.date_key = f.date_key_rented
             WHERE d.date >= ?1
             GROUP BY s.store_id",
          )?
          .query_map(params![start], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<_>>()?;

        let payments_per_store: BTreeMap<i64, f64> = conn
          .prepare(
            "SELECT s.store_id, COALESCE(SUM(f.amount), 0.0)
             FROM dim_store s
             JOIN fact_payment f ON f.store_key = s.store_key
             JOIN dim_date d ON d.date_key = f.date_key_paid
             WHERE d.date >= ?1
             GROUP BY s.store_id",
          )?
          .query_map(params![start], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<_>>()?;

        Ok(Figures {
          customer_count,
          film_count,
          rental_count,
          payment_total,
          rentals_per_store,
          payments_per_store,
        })
      })
      .await?;
    Ok(figures)
  }
}

// ─── Transaction view ────────────────────────────────────────────────────────

/// Warehouse operations against an open connection or transaction.
pub struct WarehouseConn<'a> {
  conn: &'a rusqlite::Connection,
}

impl<'a> WarehouseConn<'a> {
  pub fn new(conn: &'a rusqlite::Connection) -> Self { Self { conn } }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &rusqlite::Connection { self.conn }
}

impl WarehouseTx for WarehouseConn<'_> {
  type Error = Error;

  fn key_map(&self, kind: DimensionKind) -> Result<HashMap<i64, i64>> {
    let sql = format!(
      "SELECT {natural}, {key} FROM {table}",
      natural = kind.natural_column(),
      key = kind.key_column(),
      table = kind.table(),
    );
    let mut stmt = self.conn.prepare(&sql)?;
    let map: HashMap<i64, i64> = stmt
      .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?;
    Ok(map)
  }

  fn date_lookup(&self) -> Result<DateLookup> {
    let mut stmt = self.conn.prepare("SELECT date, date_key FROM dim_date")?;
    let keys: HashMap<NaiveDate, i64> = stmt
      .query_map([], |r| Ok((date_at(r, 0)?, r.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?;
    Ok(DateLookup::new(keys))
  }

  fn find_dimension(&self, kind: DimensionKind, natural: i64) -> Result<Option<i64>> {
    let sql = format!(
      "SELECT {key} FROM {table} WHERE {natural_col} = ?1",
      key = kind.key_column(),
      table = kind.table(),
      natural_col = kind.natural_column(),
    );
    Ok(self.conn.query_row(&sql, params![natural], |r| r.get(0)).optional()?)
  }

  fn bridge_exists(&self, row: &BridgeRow) -> Result<bool> {
    let sql = format!(
      "SELECT 1 FROM {table} WHERE film_key = ?1 AND {other} = ?2",
      table = row.kind.table(),
      other = row.kind.other().key_column(),
    );
    Ok(
      self
        .conn
        .query_row(&sql, params![row.film_key, row.other_key], |_| Ok(()))
        .optional()?
        .is_some(),
    )
  }

  fn fact_exists(&self, kind: FactKind, natural: i64) -> Result<bool> {
    let sql = format!(
      "SELECT 1 FROM {table} WHERE {natural_col} = ?1",
      table = kind.table(),
      natural_col = kind.natural_column(),
    );
    Ok(
      self
        .conn
        .query_row(&sql, params![natural], |_| Ok(()))
        .optional()?
        .is_some(),
    )
  }

  fn insert_dimension(&self, surrogate: i64, row: &DimensionRow) -> Result<()> {
    match row {
      DimensionRow::Customer(c) => self.conn.execute(
        "INSERT INTO dim_customer (
           customer_key, customer_id, first_name, last_name,
           active, city, country, last_update
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          surrogate,
          c.customer_id,
          c.first_name,
          c.last_name,
          c.active,
          c.city,
          c.country,
          encode_ts(c.last_update),
        ],
      )?,
      DimensionRow::Store(s) => self.conn.execute(
        "INSERT INTO dim_store (store_key, store_id, city, country, last_update)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![surrogate, s.store_id, s.city, s.country, encode_ts(s.last_update)],
      )?,
      DimensionRow::Film(f) => self.conn.execute(
        "INSERT INTO dim_film (
           film_key, film_id, title, rating, length,
           language, release_year, last_update
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          surrogate,
          f.film_id,
          f.title,
          f.rating,
          f.length,
          f.language,
          f.release_year,
          encode_ts(f.last_update),
        ],
      )?,
      DimensionRow::Actor(a) => self.conn.execute(
        "INSERT INTO dim_actor (actor_key, actor_id, first_name, last_name, last_update)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
          surrogate,
          a.actor_id,
          a.first_name,
          a.last_name,
          encode_ts(a.last_update),
        ],
      )?,
      DimensionRow::Category(c) => self.conn.execute(
        "INSERT INTO dim_category (category_key, category_id, name, last_update)
         VALUES (?1, ?2, ?3, ?4)",
        params![surrogate, c.category_id, c.name, encode_ts(c.last_update)],
      )?,
    };
    Ok(())
  }

  fn update_dimension(&self, row: &DimensionRow) -> Result<()> {
    match row {
      DimensionRow::Customer(c) => self.conn.execute(
        "UPDATE dim_customer
         SET first_name = ?2, last_name = ?3, active = ?4,
             city = ?5, country = ?6, last_update = ?7
         WHERE customer_id = ?1",
        params![
          c.customer_id,
          c.first_name,
          c.last_name,
          c.active,
          c.city,
          c.country,
          encode_ts(c.last_update),
        ],
      )?,
      DimensionRow::Store(s) => self.conn.execute(
        "UPDATE dim_store SET city = ?2, country = ?3, last_update = ?4
         WHERE store_id = ?1",
        params![s.store_id, s.city, s.country, encode_ts(s.last_update)],
      )?,
      DimensionRow::Film(f) => self.conn.execute(
        "UPDATE dim_film
         SET title = ?2, rating = ?3, length = ?4,
             language = ?5, release_year = ?6, last_update = ?7
         WHERE film_id = ?1",
        params![
          f.film_id,
          f.title,
          f.rating,
          f.length,
          f.language,
          f.release_year,
          encode_ts(f.last_update),
        ],
      )?,
      DimensionRow::Actor(a) => self.conn.execute(
        "UPDATE dim_actor SET first_name = ?2, last_name = ?3, last_update = ?4
         WHERE actor_id = ?1",
        params![a.actor_id, a.first_name, a.last_name, encode_ts(a.last_update)],
      )?,
      DimensionRow::Category(c) => self.conn.execute(
        "UPDATE dim_category SET name = ?2, last_update = ?3 WHERE category_id = ?1",
        params![c.category_id, c.name, encode_ts(c.last_update)],
      )?,
    };
    Ok(())
  }

  fn insert_bridge(&self, row: &BridgeRow) -> Result<()> {
    let sql = format!(
      "INSERT INTO {table} (film_key, {other}) VALUES (?1, ?2)",
      table = row.kind.table(),
      other = row.kind.other().key_column(),
    );
    self.conn.execute(&sql, params![row.film_key, row.other_key])?;
    Ok(())
  }

  fn insert_rental(&self, fact: &RentalFact) -> Result<()> {
    self.conn.execute(
      "INSERT INTO fact_rental (
         rental_id, date_key_rented, date_key_returned, film_key,
         store_key, customer_key, staff_id, rental_duration_days
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        fact.rental_id,
        fact.date_key_rented,
        fact.date_key_returned,
        fact.film_key,
        fact.store_key,
        fact.customer_key,
        fact.staff_id,
        fact.rental_duration_days,
      ],
    )?;
    Ok(())
  }

  fn insert_payment(&self, fact: &PaymentFact) -> Result<()> {
    self.conn.execute(
      "INSERT INTO fact_payment (
         payment_id, date_key_paid, customer_key, store_key, staff_id, amount
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        fact.payment_id,
        fact.date_key_paid,
        fact.customer_key,
        fact.store_key,
        fact.staff_id,
        fact.amount,
      ],
    )?;
    Ok(())
  }

  fn watermark(&self, table: SyncTable) -> Result<Option<NaiveDateTime>> {
    Ok(
      self
        .conn
        .query_row(
          "SELECT last_sync_timestamp FROM sync_state WHERE table_name = ?1",
          params![table.as_str()],
          |r| ts_at(r, 0),
        )
        .optional()?,
    )
  }

  fn advance_watermark(&self, table: SyncTable, at: NaiveDateTime) -> Result<()> {
    let at = encode_ts(at);
    let changed = self.conn.execute(
      "UPDATE sync_state SET last_sync_timestamp = ?2
       WHERE table_name = ?1 AND last_sync_timestamp < ?2",
      params![table.as_str(), at],
    )?;
    if changed == 0 && self.watermark(table)?.is_none() {
      return Err(marquee_core::Error::MissingWatermark(table).into());
    }
    Ok(())
  }
}
