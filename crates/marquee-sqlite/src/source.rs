//! [`SqliteSource`]: read-only access to a Sakila-schema SQLite database.
//!
//! Delta predicates go through `julianday()` so the watermark comparison
//! holds whether the source stores `YYYY-MM-DD HH:MM:SS` or ISO-8601 with a
//! `T` separator.

use std::{collections::BTreeMap, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{OpenFlags, params};

use marquee_core::{
  bridge::{Association, BridgeKind},
  dimension::{
    ActorDim, CategoryDim, CustomerDim, DimensionKind, DimensionRow, FilmDim,
    StoreDim,
  },
  fact::{SourcePayment, SourceRental},
  source::SourceReader,
  validate::Figures,
};

use crate::{
  Error, Result,
  encode::{encode_date, encode_ts, opt_ts_at, ts_at},
};

const CUSTOMERS: &str = "
  SELECT c.customer_id, c.first_name, c.last_name, CAST(c.active AS INTEGER),
         ci.city, co.country, c.last_update
  FROM customer c
  JOIN address a  ON a.address_id  = c.address_id
  JOIN city ci    ON ci.city_id    = a.city_id
  JOIN country co ON co.country_id = ci.country_id
  WHERE ?1 IS NULL OR julianday(c.last_update) > julianday(?1)
  ORDER BY c.customer_id";

const STORES: &str = "
  SELECT s.store_id, ci.city, co.country, s.last_update
  FROM store s
  JOIN address a  ON a.address_id  = s.address_id
  JOIN city ci    ON ci.city_id    = a.city_id
  JOIN country co ON co.country_id = ci.country_id
  WHERE ?1 IS NULL OR julianday(s.last_update) > julianday(?1)
  ORDER BY s.store_id";

const FILMS: &str = "
  SELECT f.film_id, f.title, f.rating, f.length, l.name,
         CAST(f.release_year AS INTEGER), f.last_update
  FROM film f
  JOIN language l ON l.language_id = f.language_id
  WHERE ?1 IS NULL OR julianday(f.last_update) > julianday(?1)
  ORDER BY f.film_id";

const ACTORS: &str = "
  SELECT actor_id, first_name, last_name, last_update
  FROM actor
  WHERE ?1 IS NULL OR julianday(last_update) > julianday(?1)
  ORDER BY actor_id";

const CATEGORIES: &str = "
  SELECT category_id, name, last_update
  FROM category
  WHERE ?1 IS NULL OR julianday(last_update) > julianday(?1)
  ORDER BY category_id";

const FILM_ACTORS: &str = "
  SELECT film_id, actor_id
  FROM film_actor
  WHERE ?1 IS NULL OR julianday(last_update) > julianday(?1)
  ORDER BY film_id, actor_id";

const FILM_CATEGORIES: &str = "
  SELECT film_id, category_id
  FROM film_category
  WHERE ?1 IS NULL OR julianday(last_update) > julianday(?1)
  ORDER BY film_id, category_id";

const RENTALS: &str = "
  SELECT r.rental_id, r.rental_date, r.return_date, r.customer_id, r.staff_id,
         i.film_id, i.store_id
  FROM rental r
  JOIN inventory i ON i.inventory_id = r.inventory_id
  WHERE ?1 IS NULL OR julianday(r.rental_date) > julianday(?1)
  ORDER BY r.rental_id";

const PAYMENTS: &str = "
  SELECT p.payment_id, p.payment_date, p.customer_id, p.staff_id, st.store_id,
         CAST(p.amount AS REAL)
  FROM payment p
  JOIN staff st ON st.staff_id = p.staff_id
  WHERE ?1 IS NULL OR julianday(p.payment_date) > julianday(?1)
  ORDER BY p.payment_id";

/// The operational database, opened read-only.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteSource {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSource {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn })
  }

  /// Wrap an existing connection. Tests use this to read from an in-memory
  /// fixture they also write to.
  pub fn from_connection(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  /// Run one delta query and map every row.
  async fn scan<T, F>(
    &self,
    sql: &'static str,
    since: Option<NaiveDateTime>,
    map: F,
  ) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let since = since.map(encode_ts);
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(params![since], |r| map(r))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

impl SourceReader for SqliteSource {
  type Error = Error;

  async fn dimension_rows(
    &self,
    kind: DimensionKind,
    since: Option<NaiveDateTime>,
  ) -> Result<Vec<DimensionRow>> {
    match kind {
      DimensionKind::Customer => {
        self
          .scan(CUSTOMERS, since, |r| {
            Ok(DimensionRow::Customer(CustomerDim {
              customer_id: r.get(0)?,
              first_name:  r.get(1)?,
              last_name:   r.get(2)?,
              active:      r.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
              city:        r.get(4)?,
              country:     r.get(5)?,
              last_update: ts_at(r, 6)?,
            }))
          })
          .await
      }
      DimensionKind::Store => {
        self
          .scan(STORES, since, |r| {
            Ok(DimensionRow::Store(StoreDim {
              store_id:    r.get(0)?,
              city:        r.get(1)?,
              country:     r.get(2)?,
              last_update: ts_at(r, 3)?,
            }))
          })
          .await
      }
      DimensionKind::Film => {
        self
          .scan(FILMS, since, |r| {
            Ok(DimensionRow::Film(FilmDim {
              film_id:      r.get(0)?,
              title:        r.get(1)?,
              rating:       r.get(2)?,
              length:       r.get(3)?,
              language:     r.get(4)?,
              release_year: r.get(5)?,
              last_update:  ts_at(r, 6)?,
            }))
          })
          .await
      }
      DimensionKind::Actor => {
        self
          .scan(ACTORS, since, |r| {
            Ok(DimensionRow::Actor(ActorDim {
              actor_id:    r.get(0)?,
              first_name:  r.get(1)?,
              last_name:   r.get(2)?,
              last_update: ts_at(r, 3)?,
            }))
          })
          .await
      }
      DimensionKind::Category => {
        self
          .scan(CATEGORIES, since, |r| {
            Ok(DimensionRow::Category(CategoryDim {
              category_id: r.get(0)?,
              name:        r.get(1)?,
              last_update: ts_at(r, 2)?,
            }))
          })
          .await
      }
    }
  }

  async fn associations(
    &self,
    kind: BridgeKind,
    since: Option<NaiveDateTime>,
  ) -> Result<Vec<Association>> {
    let sql = match kind {
      BridgeKind::FilmActor => FILM_ACTORS,
      BridgeKind::FilmCategory => FILM_CATEGORIES,
    };
    self
      .scan(sql, since, move |r| {
        Ok(Association { kind, film_id: r.get(0)?, other_id: r.get(1)? })
      })
      .await
  }

  async fn rentals(&self, since: Option<NaiveDateTime>) -> Result<Vec<SourceRental>> {
    self
      .scan(RENTALS, since, |r| {
        Ok(SourceRental {
          rental_id:   r.get(0)?,
          rental_date: ts_at(r, 1)?,
          return_date: opt_ts_at(r, 2)?,
          customer_id: r.get(3)?,
          staff_id:    r.get(4)?,
          film_id:     r.get(5)?,
          store_id:    r.get(6)?,
        })
      })
      .await
  }

  async fn payments(&self, since: Option<NaiveDateTime>) -> Result<Vec<SourcePayment>> {
    self
      .scan(PAYMENTS, since, |r| {
        Ok(SourcePayment {
          payment_id:   r.get(0)?,
          payment_date: ts_at(r, 1)?,
          customer_id:  r.get(2)?,
          staff_id:     r.get(3)?,
          store_id:     r.get(4)?,
          amount:       r.get(5)?,
        })
      })
      .await
  }

  async fn figures(&self, window_start: NaiveDate) -> Result<Figures> {
    let start = encode_date(window_start);
    let figures = self
      .conn
      .call(move |conn| {
        let customer_count: i64 =
          conn.query_row("SELECT COUNT(*) FROM customer", [], |r| r.get(0))?;
        let film_count: i64 =
          conn.query_row("SELECT COUNT(*) FROM film", [], |r| r.get(0))?;

        let rental_count: i64 = conn.query_row(
          "SELECT COUNT(r.rental_id)
           FROM rental r
           JOIN inventory i ON i.inventory_id = r.inventory_id
           WHERE date(r.rental_date) >= ?1",
          params![start],
          |r| r.get(0),
        )?;

        let payment_total: f64 = conn.query_row(
          "SELECT COALESCE(SUM(CAST(p.amount AS REAL)), 0.0)
           FROM payment p
           JOIN staff st ON st.staff_id = p.staff_id
           WHERE date(p.payment_date) >= ?1",
          params![start],
          |r| r.get(0),
        )?;

        let rentals_per_store: BTreeMap<i64, i64> = conn
          .prepare(
            "SELECT s.store_id, COUNT(r.rental_id)
             FROM store s
             JOIN inventory i ON i.store_id     = s.store_id
             JOIN rental r    ON r.inventory_id = i.inventory_id
             WHERE date(r.rental_date) >= ?1
             GROUP BY s.store_id",
          )?
          .query_map(params![start], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<_>>()?;

        let payments_per_store: BTreeMap<i64, f64> = conn
          .prepare(
            "SELECT s.store_id, COALESCE(SUM(CAST(p.amount AS REAL)), 0.0)
             FROM store s
             JOIN staff st  ON st.store_id = s.store_id
             JOIN payment p ON p.staff_id  = st.staff_id
             WHERE date(p.payment_date) >= ?1
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
