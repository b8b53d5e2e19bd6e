//! Core types and synchronisation logic for the Marquee rental warehouse.
//!
//! This crate knows nothing about a concrete database. Source access goes
//! through [`source::SourceReader`]; warehouse writes go through
//! [`warehouse::WarehouseTx`], which a backend implements on top of an open
//! transaction.

pub mod bridge;
pub mod calendar;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod keys;
pub mod source;
pub mod sync;
pub mod validate;
pub mod warehouse;
pub mod watermark;

pub use error::{Error, Result};
