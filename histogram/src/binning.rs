// Copyright (c) James Kassemi, SC, US. All rights reserved.
use crate::{HistogramError, Result};

/// Largest bin count a spec may ask for, per axis and for a 2D grid as a whole.
pub const MAX_BINS: usize = 1_000_000;

/// How to lay out bins.
#[derive(Debug, Clone, PartialEq)]
pub enum BinSpec {
    /// Sturges' rule over the sample range.
    Auto,
    /// Equal-width bins over the sample range.
    Count(usize),
    /// Equal-width bins over `[lo, hi]`, independent of the samples.
    Range { lo: f64, hi: f64, count: usize },
    /// Explicit ascending edges.
    Edges(Vec<f64>),
}

impl BinSpec {
    /// Parse a comma-separated spec: `"30"`, `"0, 10, 20"` (lo, hi, count) or any other
    /// number of edges. Empty input and `"0"` mean [`BinSpec::Auto`].
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(BinSpec::Auto);
        }
        let values = spec
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    HistogramError::InvalidBinning(format!("{:?} is not a number", part.trim()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        match values.as_slice() {
            [count] => match as_count(*count)? {
                0 => Ok(BinSpec::Auto),
                n => Ok(BinSpec::Count(n)),
            },
            [lo, hi, count] => Ok(BinSpec::Range {
                lo: *lo,
                hi: *hi,
                count: as_count(*count)?,
            }),
            _ => Ok(BinSpec::Edges(values)),
        }
    }
}

fn as_count(value: f64) -> Result<usize> {
    if !(value.is_finite() && value >= 0.0 && value.fract() == 0.0) {
        return Err(HistogramError::InvalidBinning(format!(
            "bin count {} is not a non-negative integer",
            value
        )));
    }
    if value > MAX_BINS as f64 {
        return Err(too_many_bins(value));
    }
    Ok(value as usize)
}

fn too_many_bins(count: impl std::fmt::Display) -> HistogramError {
    HistogramError::InvalidBinning(format!("{} bins exceeds the limit of {}", count, MAX_BINS))
}

/// Resolved bins: `N + 1` strictly ascending edges with their centers and widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    edges: Vec<f64>,
    centers: Vec<f64>,
    widths: Vec<f64>,
}

impl Binning {
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(HistogramError::InvalidBinning(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(HistogramError::InvalidBinning("edges must be finite".into()));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(HistogramError::InvalidBinning(
                "edges must be strictly ascending".into(),
            ));
        }
        let centers = edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        let widths = edges.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Self {
            edges,
            centers,
            widths,
        })
    }

    /// `count` equal-width bins over `[lo, hi]`; the last edge is exactly `hi`.
    pub fn uniform(lo: f64, hi: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(HistogramError::InvalidBinning("bin count must be positive".into()));
        }
        if count > MAX_BINS {
            return Err(too_many_bins(count));
        }
        let step = (hi - lo) / count as f64;
        let mut edges: Vec<f64> = (0..count).map(|i| lo + step * i as f64).collect();
        edges.push(hi);
        Self::from_edges(edges)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn lo(&self) -> f64 {
        self.edges[0]
    }

    pub fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin holding `x`. Bins are half-open except the last, which includes its upper edge.
    pub fn find(&self, x: f64) -> Option<usize> {
        if x.is_nan() || x < self.lo() || x > self.hi() {
            return None;
        }
        if x == self.hi() {
            return Some(self.len() - 1);
        }
        Some(self.edges.partition_point(|e| *e <= x) - 1)
    }
}

/// Sturges' rule: `1 + floor(log2(n))` bins.
pub fn sturges_bins(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1 + n.ilog2() as usize
}

fn finite_range(samples: &[f64]) -> Result<(f64, f64)> {
    let mut range: Option<(f64, f64)> = None;
    for &x in samples.iter().filter(|x| x.is_finite()) {
        range = Some(match range {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
    }
    let (lo, hi) = range.ok_or(HistogramError::EmptyDataset)?;
    if lo == hi {
        // a single distinct value still gets a unit-wide range
        Ok((lo - 0.5, hi + 0.5))
    } else {
        Ok((lo, hi))
    }
}

/// Resolve `spec` against `samples`. Sample-derived ranges ignore non-finite values.
pub fn make_binning(spec: &BinSpec, samples: &[f64]) -> Result<Binning> {
    match spec {
        BinSpec::Auto => {
            let (lo, hi) = finite_range(samples)?;
            let n = samples.iter().filter(|x| x.is_finite()).count();
            Binning::uniform(lo, hi, sturges_bins(n))
        }
        BinSpec::Count(count) => {
            let (lo, hi) = finite_range(samples)?;
            Binning::uniform(lo, hi, *count)
        }
        BinSpec::Range { lo, hi, count } => Binning::uniform(*lo, *hi, *count),
        BinSpec::Edges(edges) => Binning::from_edges(edges.clone()),
    }
}
