//! SQL schema for the analytics warehouse.

/// Warehouse DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Calendar lookup, keyed by YYYYMMDD. Populated once, never updated.
CREATE TABLE IF NOT EXISTS dim_date (
    date_key     INTEGER PRIMARY KEY,
    date         TEXT    NOT NULL,   -- YYYY-MM-DD
    year         INTEGER NOT NULL,
    quarter      INTEGER NOT NULL,
    month        INTEGER NOT NULL,
    day_of_month INTEGER NOT NULL,
    day_of_week  INTEGER NOT NULL,   -- 0 = Monday
    is_weekend   INTEGER NOT NULL
);

-- Dimension surrogate keys are natural_id * 100 + 1, never a sequence.
CREATE TABLE IF NOT EXISTS dim_customer (
    customer_key INTEGER PRIMARY KEY,
    customer_id  INTEGER NOT NULL UNIQUE,
    first_name   TEXT,
    last_name    TEXT,
    active       INTEGER,
    city         TEXT,
    country      TEXT,
    last_update  TEXT
);

CREATE TABLE IF NOT EXISTS dim_store (
    store_key   INTEGER PRIMARY KEY,
    store_id    INTEGER NOT NULL UNIQUE,
    city        TEXT,
    country     TEXT,
    last_update TEXT
);

CREATE TABLE IF NOT EXISTS dim_film (
    film_key     INTEGER PRIMARY KEY,
    film_id      INTEGER NOT NULL UNIQUE,
    title        TEXT,
    rating       TEXT,
    length       INTEGER,
    language     TEXT,
    release_year INTEGER,
    last_update  TEXT
);

CREATE TABLE IF NOT EXISTS dim_actor (
    actor_key   INTEGER PRIMARY KEY,
    actor_id    INTEGER NOT NULL UNIQUE,
    first_name  TEXT,
    last_name   TEXT,
    last_update TEXT
);

CREATE TABLE IF NOT EXISTS dim_category (
    category_key INTEGER PRIMARY KEY,
    category_id  INTEGER NOT NULL UNIQUE,
    name         TEXT,
    last_update  TEXT
);

CREATE TABLE IF NOT EXISTS bridge_film_actor (
    film_key  INTEGER NOT NULL REFERENCES dim_film(film_key),
    actor_key INTEGER NOT NULL REFERENCES dim_actor(actor_key),
    PRIMARY KEY (film_key, actor_key)
);

CREATE TABLE IF NOT EXISTS bridge_film_category (
    film_key     INTEGER NOT NULL REFERENCES dim_film(film_key),
    category_key INTEGER NOT NULL REFERENCES dim_category(category_key),
    PRIMARY KEY (film_key, category_key)
);

-- Facts are insert-only. Foreign keys are nullable: an unresolved dimension
-- leaves a NULL rather than rejecting the row.
CREATE TABLE IF NOT EXISTS fact_rental (
    fact_rental_key      INTEGER PRIMARY KEY AUTOINCREMENT,
    rental_id            INTEGER NOT NULL UNIQUE,
    date_key_rented      INTEGER REFERENCES dim_date(date_key),
    date_key_returned    INTEGER REFERENCES dim_date(date_key),
    film_key             INTEGER REFERENCES dim_film(film_key),
    store_key            INTEGER REFERENCES dim_store(store_key),
    customer_key         INTEGER REFERENCES dim_customer(customer_key),
    staff_id             INTEGER,
    rental_duration_days INTEGER
);

CREATE TABLE IF NOT EXISTS fact_payment (
    fact_payment_key INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id       INTEGER NOT NULL UNIQUE,
    date_key_paid    INTEGER REFERENCES dim_date(date_key),
    customer_key     INTEGER REFERENCES dim_customer(customer_key),
    store_key        INTEGER REFERENCES dim_store(store_key),
    staff_id         INTEGER,
    amount           REAL
);

-- One row per managed source table; the timestamp only moves forward.
CREATE TABLE IF NOT EXISTS sync_state (
    table_name          TEXT PRIMARY KEY,
    last_sync_timestamp TEXT NOT NULL
);

PRAGMA user_version = 1;
";

/// Indexes on fact foreign keys, created by `init`.
pub const FACT_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_fact_rental_date_rented ON fact_rental (date_key_rented);
CREATE INDEX IF NOT EXISTS idx_fact_rental_film        ON fact_rental (film_key);
CREATE INDEX IF NOT EXISTS idx_fact_rental_store       ON fact_rental (store_key);
CREATE INDEX IF NOT EXISTS idx_fact_rental_customer    ON fact_rental (customer_key);
CREATE INDEX IF NOT EXISTS idx_fact_payment_date_paid  ON fact_payment (date_key_paid);
CREATE INDEX IF NOT EXISTS idx_fact_payment_store      ON fact_payment (store_key);
CREATE INDEX IF NOT EXISTS idx_fact_payment_customer   ON fact_payment (customer_key);
";

/// Drops every warehouse table, children before parents.
pub const DROP_ALL: &str = "
DROP TABLE IF EXISTS fact_payment;
DROP TABLE IF EXISTS fact_rental;
DROP TABLE IF EXISTS bridge_film_category;
DROP TABLE IF EXISTS bridge_film_actor;
DROP TABLE IF EXISTS dim_category;
DROP TABLE IF EXISTS dim_actor;
DROP TABLE IF EXISTS dim_film;
DROP TABLE IF EXISTS dim_store;
DROP TABLE IF EXISTS dim_customer;
DROP TABLE IF EXISTS dim_date;
DROP TABLE IF EXISTS sync_state;
";
