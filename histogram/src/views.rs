// Copyright (c) James Kassemi, SC, US. All rights reserved.
use crate::{HistogramError, Result};

/// `sqrt(n)` per bin, with empty bins given an error of 1.
pub fn poisson_errors(contents: &[f64]) -> Vec<f64> {
    contents
        .iter()
        .map(|c| if *c == 0.0 { 1.0 } else { c.sqrt() })
        .collect()
}

fn zero_non_finite(values: &mut [f64]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Scale so that `sum(content * width) == 1`. A zero total yields all zeros.
pub fn density(contents: &[f64], errors: &[f64], widths: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let total: f64 = contents.iter().sum();
    let mut c: Vec<f64> = contents
        .iter()
        .zip(widths)
        .map(|(c, w)| c / (total * w))
        .collect();
    let mut e: Vec<f64> = errors
        .iter()
        .zip(widths)
        .map(|(e, w)| e / (total * w))
        .collect();
    zero_non_finite(&mut c);
    zero_non_finite(&mut e);
    (c, e)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Running sum from the low edge.
    Forward,
    /// Total minus the running sum, i.e. the content above each bin.
    Reverse,
}

/// Running sum of `content * width` (width 1 when `widths` is `None`); errors add in
/// quadrature.
pub fn cumulative(
    contents: &[f64],
    errors: &[f64],
    widths: Option<&[f64]>,
    direction: Direction,
) -> (Vec<f64>, Vec<f64>) {
    let width = |i: usize| widths.map_or(1.0, |w| w[i]);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut c = Vec::with_capacity(contents.len());
    let mut e = Vec::with_capacity(errors.len());
    for i in 0..contents.len() {
        sum += contents[i] * width(i);
        c.push(sum);
        if let Some(err) = errors.get(i) {
            let scaled = err * width(i);
            sum_sq += scaled * scaled;
            e.push(sum_sq);
        }
    }
    match direction {
        Direction::Forward => {
            e.iter_mut().for_each(|v| *v = v.sqrt());
        }
        Direction::Reverse => {
            let total = sum;
            let total_sq = sum_sq;
            c.iter_mut().for_each(|v| *v = total - *v);
            e.iter_mut().for_each(|v| *v = (total_sq - *v).max(0.0).sqrt());
        }
    }
    (c, e)
}

/// Recover bin contents from a forward [`cumulative`] sequence with the same widths.
pub fn uncumulate(cumulated: &[f64], widths: Option<&[f64]>) -> Vec<f64> {
    let width = |i: usize| widths.map_or(1.0, |w| w[i]);
    let mut prev = 0.0;
    let mut out = Vec::with_capacity(cumulated.len());
    for (i, &value) in cumulated.iter().enumerate() {
        out.push((value - prev) / width(i));
        prev = value;
    }
    out
}

/// Stairstep polyline through the histogram: every edge twice, the plateaus in between,
/// pinned to zero at both ends. Both vectors have length `2 * edges.len()`.
pub fn step_points(contents: &[f64], edges: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if contents.len() + 1 != edges.len() {
        return Err(HistogramError::LengthMismatch {
            left: contents.len() + 1,
            right: edges.len(),
        });
    }
    let mut x = Vec::with_capacity(2 * edges.len());
    let mut y = Vec::with_capacity(2 * edges.len());
    for (i, &edge) in edges.iter().enumerate() {
        x.push(edge);
        x.push(edge);
        y.push(if i == 0 { 0.0 } else { contents[i - 1] });
        y.push(contents.get(i).copied().unwrap_or(0.0));
    }
    Ok((x, y))
}

/// 2D analog of [`density`]: divide by `total * dx * dy`; non-finite cells become zero.
pub fn density2d(contents: &[Vec<f64>], xwidths: &[f64], ywidths: &[f64]) -> Vec<Vec<f64>> {
    let total: f64 = contents.iter().flatten().sum();
    contents
        .iter()
        .zip(ywidths)
        .map(|(row, dy)| {
            let mut out: Vec<f64> = row
                .iter()
                .zip(xwidths)
                .map(|(c, dx)| c / (total * dx * dy))
                .collect();
            zero_non_finite(&mut out);
            out
        })
        .collect()
}
