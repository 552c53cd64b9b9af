// Copyright (c) James Kassemi, SC, US. All rights reserved.
use histogram::{
    BinSpec, Binning, Histogram, Histogram2d, ProfileBin, StatValue, Stats1d, Stats2d, histogram,
    histogram2d, make_binning, profile, stats1d, stats2d,
};

use crate::error::{PipelineError, Result};
use crate::prepare::SeriesData;
use crate::settings::{Mode, SeriesConfig};

/// Mode-specific result handed to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// `xy` and `map` plot the samples as they are.
    Samples(SeriesData),
    Hist1d {
        histogram: Histogram,
        stats: Stats1d,
        shown: Vec<(&'static str, StatValue)>,
    },
    Hist2d {
        histogram: Histogram2d,
        stats: Stats2d,
        shown: Vec<(&'static str, StatValue)>,
    },
    Profile {
        binning: Binning,
        bins: Vec<ProfileBin>,
    },
}

fn require<'d>(series: &SeriesConfig, data: &'d SeriesData, axis: char) -> Result<&'d [f64]> {
    data.axis(axis).ok_or(PipelineError::MissingAxis {
        series: series.slot,
        axis,
    })
}

/// Resolve a bin spec; an unset spec falls back to Sturges' rule over `samples`.
fn resolve_bins(spec: &BinSpec, samples: &[f64]) -> Result<Binning> {
    Ok(make_binning(spec, samples)?)
}

pub fn analyze(series: &SeriesConfig, data: &SeriesData) -> Result<Analysis> {
    match series.mode {
        Mode::Xy | Mode::Map => {
            require(series, data, 'x')?;
            require(series, data, 'y')?;
            Ok(Analysis::Samples(data.clone()))
        }
        Mode::Hist1d => {
            let x = require(series, data, 'x')?;
            let bins = resolve_bins(&series.x_bins, x)?;
            let histogram = histogram(x, &bins);
            let stats = stats1d(&histogram)?;
            log::debug!("series {} statistics: {:?}", series.slot, stats);
            let shown = series.stats.select1d(&stats);
            Ok(Analysis::Hist1d {
                histogram,
                stats,
                shown,
            })
        }
        Mode::Hist2d => {
            let x = require(series, data, 'x')?;
            let y = require(series, data, 'y')?;
            let xb = resolve_bins(&series.x_bins, x)?;
            let yb = resolve_bins(&series.y_bins, y)?;
            let histogram = histogram2d(x, y, &xb, &yb)?;
            let stats = stats2d(&histogram)?;
            log::debug!("series {} statistics: {:?}", series.slot, stats);
            let shown = series.stats.select2d(&stats);
            Ok(Analysis::Hist2d {
                histogram,
                stats,
                shown,
            })
        }
        Mode::Profile => {
            let x = require(series, data, 'x')?;
            let y = require(series, data, 'y')?;
            let binning = resolve_bins(&series.x_bins, x)?;
            let bins = profile(x, y, &binning)?;
            Ok(Analysis::Profile { binning, bins })
        }
    }
}
