// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Read-only access to columnar tables stored as parquet files.
//!
//! A table is addressed as `"<file>:<table path>"`, relative to a data directory. Every
//! column is exposed as `f64` so rows can be fed to compiled expressions directly.

pub mod catalog;
pub mod error;
pub mod rows;
pub mod source;
pub mod writer;

pub use catalog::{TableSpec, available_tables};
pub use error::{Result, SourceError};
pub use rows::{Row, RowIter};
pub use source::{TableSource, UNKNOWN_UNIT, split_identifier};
pub use writer::{TableMeta, TableWriter};

/// Parquet key/value metadata holding the internal table path.
pub const META_TABLE: &str = "ctplot.table";
/// Parquet key/value metadata holding the table title.
pub const META_TITLE: &str = "ctplot.title";
/// Parquet key/value metadata holding a JSON array of per-column units.
pub const META_UNITS: &str = "ctplot.units";
