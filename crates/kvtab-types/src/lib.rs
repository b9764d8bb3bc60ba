//! Foundation types for kvtab.
//!
//! kvtab stores logical databases, tables and rows as a three-tier
//! hash-of-hashes inside a schemaless key-value backend. This crate holds the
//! pure pieces every other kvtab crate shares: how logical names become
//! physical keys, the in-flight write unit, timestamps, and the legacy
//! sentinel codes.
//!
//! # Key Types
//!
//! - [`DatabaseId`] -- physical key of a database metadata hash
//! - [`TableId`] -- physical key of a table metadata hash
//! - [`RowKey`] -- physical key of one row hash
//! - [`KeyMode`] -- structured (`table.id`) or flat (`id`) row keys
//! - [`RData`] -- one field write with its put mode, expiry and timestamp
//! - [`Stamp`] -- creation / registration timestamp stored in metadata hashes
//! - [`Sentinel`] -- negative return codes of the compatibility API

pub mod data;
pub mod error;
pub mod naming;
pub mod sentinel;
pub mod temporal;

pub use data::{FieldMap, FieldValues, PutMode, RData};
pub use error::TypeError;
pub use naming::{require, DatabaseId, KeyMode, RowKey, TableId, DATABASE_PREFIX, PLACEHOLDER_FIELD};
pub use sentinel::Sentinel;
pub use temporal::Stamp;
