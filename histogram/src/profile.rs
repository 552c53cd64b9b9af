// Copyright (c) James Kassemi, SC, US. All rights reserved.
use crate::binning::Binning;
use crate::{HistogramError, Result};

/// Mean and population spread of `y` within one `x` bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileBin {
    pub center: f64,
    pub half_width: f64,
    pub count: usize,
    /// `None` for bins without samples.
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// Profile of `ys` against `xs`, with every bin half-open (`lo <= x < hi`).
pub fn profile(xs: &[f64], ys: &[f64], binning: &Binning) -> Result<Vec<ProfileBin>> {
    if xs.len() != ys.len() {
        return Err(HistogramError::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    let edges = binning.edges();
    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); binning.len()];
    for (&x, &y) in xs.iter().zip(ys) {
        if !(binning.lo() <= x && x < binning.hi()) {
            continue;
        }
        let idx = edges.partition_point(|e| *e <= x) - 1;
        groups[idx].push(y);
    }

    Ok(groups
        .iter()
        .zip(binning.centers().iter().zip(binning.widths()))
        .map(|(values, (&center, &width))| {
            let count = values.len();
            let (mean, std) = if count == 0 {
                (None, None)
            } else {
                let mean = values.iter().sum::<f64>() / count as f64;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
                (Some(mean), Some(var.sqrt()))
            };
            ProfileBin {
                center,
                half_width: width / 2.0,
                count,
                mean,
                std,
            }
        })
        .collect())
}
