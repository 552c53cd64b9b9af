// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Histogram binning, derived views and moment statistics computed from binned data.

mod binning;
mod hist;
mod profile;
mod stats;
mod views;

pub use binning::{BinSpec, Binning, MAX_BINS, make_binning, sturges_bins};
pub use hist::{Histogram, Histogram2d, histogram, histogram2d};
pub use profile::{ProfileBin, profile};
pub use stats::{StatKind, StatValue, Stats1d, Stats2d, StatsSelection, stats1d, stats2d};
pub use views::{Direction, cumulative, density, density2d, poisson_errors, step_points, uncumulate};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistogramError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    #[error("no finite samples to bin or describe")]
    EmptyDataset,
    #[error("invalid binning: {0}")]
    InvalidBinning(String),
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}
