//! SQLite backend for the Marquee warehouse pipeline.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteSource`] reads a Sakila-schema
//! operational database; [`SqliteWarehouse`] owns the star schema and the
//! [`pipeline`] commands drive one into the other.

mod encode;
mod schema;

pub mod error;
pub mod pipeline;
pub mod source;
pub mod warehouse;

pub use error::{Error, Result};
pub use source::SqliteSource;
pub use warehouse::{SqliteWarehouse, WarehouseConn};
