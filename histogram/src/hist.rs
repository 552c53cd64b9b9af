// Copyright (c) James Kassemi, SC, US. All rights reserved.
use crate::binning::{Binning, MAX_BINS};
use crate::views::poisson_errors;
use crate::{HistogramError, Result};

/// 1D histogram with Poisson errors. Under/overflow count finite samples outside the edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub contents: Vec<f64>,
    pub errors: Vec<f64>,
    pub binning: Binning,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram {
    pub fn total(&self) -> f64 {
        self.contents.iter().sum()
    }
}

/// Count `samples` into `binning`. NaN samples are ignored.
pub fn histogram(samples: &[f64], binning: &Binning) -> Histogram {
    let mut contents = vec![0.0; binning.len()];
    let mut underflow = 0;
    let mut overflow = 0;
    for &x in samples {
        match binning.find(x) {
            Some(idx) => contents[idx] += 1.0,
            None if x < binning.lo() => underflow += 1,
            None if x > binning.hi() => overflow += 1,
            None => {}
        }
    }
    let errors = poisson_errors(&contents);
    Histogram {
        contents,
        errors,
        binning: binning.clone(),
        underflow,
        overflow,
    }
}

/// Joint histogram; `contents[j][i]` counts samples in y bin `j` and x bin `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub contents: Vec<Vec<f64>>,
    pub x: Binning,
    pub y: Binning,
}

impl Histogram2d {
    pub fn total(&self) -> f64 {
        self.contents.iter().flatten().sum()
    }
}

/// Bin `(xs[k], ys[k])` pairs. Pairs with either coordinate outside its binning are dropped.
pub fn histogram2d(xs: &[f64], ys: &[f64], x: &Binning, y: &Binning) -> Result<Histogram2d> {
    if xs.len() != ys.len() {
        return Err(HistogramError::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    if x.len().saturating_mul(y.len()) > MAX_BINS {
        return Err(HistogramError::InvalidBinning(format!(
            "{} x {} grid exceeds the limit of {} bins",
            x.len(),
            y.len(),
            MAX_BINS
        )));
    }
    let mut contents = vec![vec![0.0; x.len()]; y.len()];
    for (&xv, &yv) in xs.iter().zip(ys) {
        if let (Some(i), Some(j)) = (x.find(xv), y.find(yv)) {
            contents[j][i] += 1.0;
        }
    }
    Ok(Histogram2d {
        contents,
        x: x.clone(),
        y: y.clone(),
    })
}
