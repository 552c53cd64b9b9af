// Copyright (c) James Kassemi, SC, US. All rights reserved.
use crate::hist::{Histogram, Histogram2d};
use crate::views::{Direction, cumulative, density};
use crate::{HistogramError, Result};

/// Moments and order statistics of a 1D histogram, evaluated at bin centers.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats1d {
    pub n: f64,
    pub uflow: u64,
    pub oflow: u64,
    pub mean: f64,
    pub std: f64,
    pub mode: f64,
    pub median: f64,
    /// `None` when the distribution has zero spread.
    pub skew: Option<f64>,
    pub kurtosis: Option<f64>,
    pub excess: Option<f64>,
}

pub fn stats1d(hist: &Histogram) -> Result<Stats1d> {
    let contents = &hist.contents;
    let centers = hist.binning.centers();
    let widths = hist.binning.widths();
    let n: f64 = contents.iter().sum();
    if n <= 0.0 || centers.is_empty() {
        return Err(HistogramError::EmptyDataset);
    }

    let weighted = |f: &dyn Fn(f64) -> f64| -> f64 {
        centers.iter().zip(contents).map(|(x, c)| f(*x) * c).sum::<f64>() / n
    };
    let mean = weighted(&|x| x);
    let std = weighted(&|x| (x - mean).powi(2)).sqrt();

    let mut mode_idx = 0;
    for (idx, c) in contents.iter().enumerate() {
        if *c > contents[mode_idx] {
            mode_idx = idx;
        }
    }

    let (dens, dens_err) = density(contents, &hist.errors, widths);
    let (cdf, _) = cumulative(&dens, &dens_err, Some(widths), Direction::Forward);
    let median_idx = cdf.partition_point(|v| *v <= 0.5).min(centers.len() - 1);
    let mut median = centers[median_idx];
    if centers.len() % 2 == 0 && median_idx > 0 {
        median = (median + centers[median_idx - 1]) / 2.0;
    }

    let (skew, kurtosis) = if std > 0.0 {
        (
            Some(weighted(&|x| ((x - mean) / std).powi(3))),
            Some(weighted(&|x| ((x - mean) / std).powi(4))),
        )
    } else {
        (None, None)
    };

    Ok(Stats1d {
        n,
        uflow: hist.underflow,
        oflow: hist.overflow,
        mean,
        std,
        mode: centers[mode_idx],
        median,
        skew,
        kurtosis,
        excess: kurtosis.map(|k| k - 3.0),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats2d {
    pub n: f64,
    pub mean: [f64; 2],
    pub std: [f64; 2],
    pub cov: f64,
}

pub fn stats2d(hist: &Histogram2d) -> Result<Stats2d> {
    let xc = hist.x.centers();
    let yc = hist.y.centers();
    let n = hist.total();
    if n <= 0.0 {
        return Err(HistogramError::EmptyDataset);
    }
    let mut xsum = vec![0.0; xc.len()];
    let mut ysum = vec![0.0; yc.len()];
    for (j, row) in hist.contents.iter().enumerate() {
        for (i, c) in row.iter().enumerate() {
            xsum[i] += c;
            ysum[j] += c;
        }
    }
    let project = |sums: &[f64], centers: &[f64], f: &dyn Fn(f64) -> f64| -> f64 {
        sums.iter().zip(centers).map(|(s, x)| s * f(*x)).sum::<f64>() / n
    };
    let mx = project(&xsum, xc, &|x| x);
    let my = project(&ysum, yc, &|y| y);
    let sx = project(&xsum, xc, &|x| (x - mx).powi(2)).sqrt();
    let sy = project(&ysum, yc, &|y| (y - my).powi(2)).sqrt();

    let mut cov = 0.0;
    for (j, row) in hist.contents.iter().enumerate() {
        for (i, c) in row.iter().enumerate() {
            cov += c * (xc[i] - mx) * (yc[j] - my);
        }
    }

    Ok(Stats2d {
        n,
        mean: [mx, my],
        std: [sx, sy],
        cov: cov / n,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    N,
    Uflow,
    Oflow,
    Mean,
    Std,
    Mode,
    Median,
    Skew,
    Kurtosis,
    Excess,
    Cov,
}

impl StatKind {
    pub fn from_abbrev(c: char) -> Option<Self> {
        Some(match c {
            'n' => StatKind::N,
            'u' => StatKind::Uflow,
            'o' => StatKind::Oflow,
            'm' => StatKind::Mean,
            's' => StatKind::Std,
            'p' => StatKind::Mode,
            'e' => StatKind::Median,
            'w' => StatKind::Skew,
            'k' => StatKind::Kurtosis,
            'x' => StatKind::Excess,
            'c' => StatKind::Cov,
            _ => return None,
        })
    }

    /// Label shown next to the value.
    pub fn name(self) -> &'static str {
        match self {
            StatKind::N => "N",
            StatKind::Uflow => "uflow",
            StatKind::Oflow => "oflow",
            StatKind::Mean => "mean",
            StatKind::Std => "std",
            StatKind::Mode => "mode",
            StatKind::Median => "median",
            StatKind::Skew => "skew",
            StatKind::Kurtosis => "kurtos",
            StatKind::Excess => "excess",
            StatKind::Cov => "cov",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Scalar(f64),
    Pair([f64; 2]),
}

impl Stats1d {
    pub fn get(&self, kind: StatKind) -> Option<StatValue> {
        let value = match kind {
            StatKind::N => self.n,
            StatKind::Uflow => self.uflow as f64,
            StatKind::Oflow => self.oflow as f64,
            StatKind::Mean => self.mean,
            StatKind::Std => self.std,
            StatKind::Mode => self.mode,
            StatKind::Median => self.median,
            StatKind::Skew => self.skew?,
            StatKind::Kurtosis => self.kurtosis?,
            StatKind::Excess => self.excess?,
            StatKind::Cov => return None,
        };
        Some(StatValue::Scalar(value))
    }
}

impl Stats2d {
    pub fn get(&self, kind: StatKind) -> Option<StatValue> {
        match kind {
            StatKind::N => Some(StatValue::Scalar(self.n)),
            StatKind::Mean => Some(StatValue::Pair(self.mean)),
            StatKind::Std => Some(StatValue::Pair(self.std)),
            StatKind::Cov => Some(StatValue::Scalar(self.cov)),
            _ => None,
        }
    }
}

/// Ordered choice of statistics to report, parsed from single-letter abbreviations.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSelection {
    kinds: Vec<StatKind>,
}

impl StatsSelection {
    /// `a` anywhere selects `nmscpewx`; unknown letters are ignored.
    pub fn parse(spec: &str) -> Self {
        let spec = if spec.contains('a') { "nmscpewx" } else { spec };
        let mut kinds = Vec::new();
        for kind in spec.chars().filter_map(StatKind::from_abbrev) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self { kinds }
    }

    pub fn kinds(&self) -> &[StatKind] {
        &self.kinds
    }

    /// Selected values in order, with under/overflow appended when non-zero.
    pub fn select1d(&self, stats: &Stats1d) -> Vec<(&'static str, StatValue)> {
        let mut kinds = self.kinds.clone();
        for (kind, count) in [(StatKind::Uflow, stats.uflow), (StatKind::Oflow, stats.oflow)] {
            if count > 0 && !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
            .into_iter()
            .filter_map(|kind| stats.get(kind).map(|v| (kind.name(), v)))
            .collect()
    }

    pub fn select2d(&self, stats: &Stats2d) -> Vec<(&'static str, StatValue)> {
        self.kinds
            .iter()
            .filter_map(|kind| stats.get(*kind).map(|v| (kind.name(), v)))
            .collect()
    }
}

impl Default for StatsSelection {
    fn default() -> Self {
        Self::parse("nmsc")
    }
}
