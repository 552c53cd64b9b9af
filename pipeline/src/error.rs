// Copyright (c) James Kassemi, SC, US. All rights reserved.
use aggregations::AveragerError;
use avg_cache::CacheError;
use expr::{EvalError, ExprError};
use histogram::HistogramError;
use table_source::SourceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid setting {key}: {reason}")]
    Settings { key: String, reason: String },
    #[error("evaluating rows of {identifier}: {error}")]
    RowEval { identifier: String, error: EvalError },
    #[error("series {series} has no {axis} expression")]
    MissingAxis { series: usize, axis: char },
    #[error("no series at position {0}")]
    UnknownSeries(usize),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("expression error: {0}")]
    Expr(#[from] ExprError),
    #[error("row evaluation error: {0}")]
    Eval(#[from] EvalError),
    #[error("averaging error: {0}")]
    Averager(#[from] AveragerError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("histogram error: {0}")]
    Histogram(#[from] HistogramError),
}

impl PipelineError {
    pub(crate) fn settings(key: &str, reason: impl ToString) -> Self {
        PipelineError::Settings {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
