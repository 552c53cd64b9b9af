// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Settings to samples to histograms.
//!
//! [`PlotRequest::from_settings`] validates the raw key/value settings once.
//! [`Pipeline::prepare`] then reads every distinct source a single time (through the
//! averaged-data cache when a series asks for window averaging) and evaluates all
//! expressions of the series sharing it. [`PreparedData::analyze`] turns one series into
//! a histogram, profile or plain sample set for the rendering layer.

mod analysis;
mod error;
mod prepare;
mod settings;

pub use analysis::{Analysis, analyze};
pub use error::{PipelineError, Result};
pub use prepare::{ExprColumn, Pipeline, PreparedData, SeriesData, SourceData};
pub use settings::{Averaging, Field, MAX_SERIES, Mode, PlotRequest, SeriesConfig, SourceKey};
