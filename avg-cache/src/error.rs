// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::PathBuf;
use std::time::Duration;

use aggregations::AveragerError;
use thiserror::Error;

use crate::request::CacheKey;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("timed out after {waited:?} waiting for the cache lock of {key}")]
    LockTimeout { key: CacheKey, waited: Duration },
    /// A fresh entry could not be opened; the cache file is held elsewhere or corrupt.
    #[error("cache for {key} in use or corrupt: {reason}")]
    Compute { key: CacheKey, reason: String },
    #[error("cache entry {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Averager(#[from] AveragerError),
}
