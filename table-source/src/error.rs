// Copyright (c) James Kassemi, SC, US. All rights reserved.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("table {identifier} not found: {reason}")]
    NotFound { identifier: String, reason: String },
    #[error("table {identifier} is not a readable table: {reason}")]
    Format { identifier: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("units metadata error: {0}")]
    Json(#[from] serde_json::Error),
}
