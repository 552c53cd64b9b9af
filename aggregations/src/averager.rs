// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::VecDeque;
use std::sync::Arc;

use core_types::ProgressScope;
use expr::CompiledExpr;
use table_source::Row;

use crate::record::{RecordSchema, WindowRecord};
use crate::{AveragerError, Result, check_shift};

#[derive(Debug, Clone)]
pub struct AveragerConfig {
    /// Window width in the unit of the time column.
    pub window: f64,
    /// Fraction of the width the window advances by; 1 gives tumbling windows.
    pub shift: f64,
    pub time_field: String,
    /// Rows between progress updates.
    pub progress_stride: u64,
}

impl AveragerConfig {
    pub fn new(window: f64, shift: f64) -> Self {
        Self {
            window,
            shift,
            time_field: "time".to_string(),
            progress_stride: 10_000,
        }
    }

    pub fn with_time_field(mut self, field: &str) -> Self {
        self.time_field = field.to_string();
        self
    }
}

/// Averages a time-ordered row stream over windows `[ta, ta + W)`.
///
/// A window is emitted only when a later row closes it, so a trailing partial window at
/// the end of the stream is dropped. Windows that would be empty are skipped by snapping
/// the left edge forward to the next row.
pub struct WindowAverager<'p, I> {
    rows: I,
    schema: RecordSchema,
    weight: CompiledExpr,
    time_idx: usize,
    window: f64,
    shift: f64,
    ta: f64,
    tb: f64,
    started: bool,
    buffer: VecDeque<(Row, f64)>,
    sums: Vec<f64>,
    consumed: u64,
    progress: Option<ProgressScope<'p>>,
    stride: u64,
    done: bool,
}

impl<'p, I> WindowAverager<'p, I>
where
    I: Iterator<Item = table_source::Result<Row>>,
{
    /// `weight` is evaluated against raw rows laid out as `columns`.
    pub fn new(
        rows: I,
        columns: Arc<[String]>,
        config: &AveragerConfig,
        weight: CompiledExpr,
    ) -> Result<Self> {
        if !(config.window.is_finite() && config.window > 0.0) {
            return Err(AveragerError::InvalidWindow(config.window.to_string()));
        }
        let shift = check_shift(config.shift)?;
        let time_idx = columns
            .iter()
            .position(|c| *c == config.time_field)
            .ok_or_else(|| AveragerError::MissingTimeField {
                field: config.time_field.clone(),
            })?;
        let width = columns.len();
        Ok(Self {
            rows,
            schema: RecordSchema::new(columns),
            weight,
            time_idx,
            window: config.window,
            shift,
            ta: 0.0,
            tb: 0.0,
            started: false,
            buffer: VecDeque::new(),
            sums: vec![0.0; width],
            consumed: 0,
            progress: None,
            stride: config.progress_stride.max(1),
            done: false,
        })
    }

    pub fn with_progress(mut self, scope: ProgressScope<'p>) -> Self {
        self.progress = Some(scope);
        self
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Raw rows pulled from the source so far.
    pub fn rows_consumed(&self) -> u64 {
        self.consumed
    }

    fn report(&mut self) {
        if let Some(scope) = self.progress.as_mut() {
            scope.rows_done(self.consumed);
        }
    }

    fn emit(&mut self) -> WindowRecord {
        let n = self.buffer.len();
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        let mut weight_sum = 0.0;
        for (row, weight) in &self.buffer {
            for (sum, value) in self.sums.iter_mut().zip(row.values()) {
                *sum += value;
            }
            weight_sum += weight;
        }
        let count = n as f64;
        let mut means: Vec<f64> = self.sums.iter().map(|s| s / count).collect();
        means[self.time_idx] = (self.ta + self.tb) * 0.5;
        WindowRecord::new(means, n as u64, weight_sum / count, count / self.window)
    }

    fn push(&mut self, row: Row) -> Result<()> {
        let weight = self.weight.eval_f64(row.values())?;
        self.buffer.push_back((row, weight));
        Ok(())
    }

    fn step(&mut self, row: Row) -> Result<Option<WindowRecord>> {
        let t = row.values()[self.time_idx];
        if !self.started {
            self.started = true;
            self.ta = t;
            self.tb = t + self.window;
        }
        if t < self.tb {
            self.push(row)?;
            return Ok(None);
        }

        let record = if self.buffer.is_empty() {
            None
        } else {
            Some(self.emit())
        };
        self.ta += self.shift * self.window;
        self.tb = self.ta + self.window;
        if t >= self.tb {
            self.ta = t;
            self.tb = t + self.window;
        }
        if self.shift == 1.0 {
            self.buffer.clear();
        } else {
            let (ta, tb, idx) = (self.ta, self.tb, self.time_idx);
            self.buffer.retain(|(r, _)| {
                let t = r.values()[idx];
                ta <= t && t < tb
            });
        }
        self.push(row)?;
        Ok(record)
    }
}

impl<I> Iterator for WindowAverager<'_, I>
where
    I: Iterator<Item = table_source::Result<Row>>,
{
    type Item = Result<WindowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                None => {
                    if !self.buffer.is_empty() {
                        log::debug!(
                            "dropping trailing partial window with {} rows",
                            self.buffer.len()
                        );
                    }
                    self.done = true;
                    self.report();
                    return None;
                }
            };
            self.consumed += 1;
            let result = self.step(row);
            if self.consumed % self.stride == 0 {
                self.report();
            }
            match result {
                Ok(Some(record)) => {
                    self.report();
                    return Some(Ok(record));
                }
                Ok(None) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr::{FieldSchema, compile};

    fn columns() -> Arc<[String]> {
        vec!["time".to_string(), "v".to_string()].into()
    }

    fn rows(data: &[(f64, f64)]) -> impl Iterator<Item = table_source::Result<Row>> + use<> {
        let cols = columns();
        data.iter()
            .map(move |(t, v)| Ok(Row::new(Arc::clone(&cols), vec![*t, *v])))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn average(data: &[(f64, f64)], window: f64, shift: f64) -> Vec<WindowRecord> {
        let config = AveragerConfig::new(window, shift);
        WindowAverager::new(rows(data), columns(), &config, CompiledExpr::constant(1.0))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn tumbling_windows_average_columns() {
        let data = [(0.0, 1.0), (1.0, 3.0), (2.0, 5.0), (3.0, 7.0), (4.0, 0.0)];
        let out = average(&data, 2.0, 1.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].means(), &[1.0, 2.0]);
        assert_eq!(out[0].count(), 2);
        assert_eq!(out[0].rate(), 1.0);
        assert_eq!(out[0].weight(), 1.0);
        assert_eq!(out[1].means(), &[3.0, 6.0]);
    }

    #[test]
    fn trailing_window_is_not_flushed() {
        let out = average(&[(0.0, 1.0), (1.0, 1.0), (1.5, 1.0)], 10.0, 1.0);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_windows_are_skipped() {
        let data = [(0.0, 1.0), (1.0, 1.0), (100.0, 2.0), (101.0, 2.0), (200.0, 0.0)];
        let out = average(&data, 10.0, 1.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].means()[0], 5.0);
        // the left edge snapped to the first row past the gap
        assert_eq!(out[1].means()[0], 105.0);
        assert_eq!(out[1].count(), 2);
    }

    #[test]
    fn sliding_windows_share_rows() {
        let data = [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0), (4.0, 5.0), (5.0, 6.0)];
        let out = average(&data, 2.0, 0.5);
        let counts: Vec<u64> = out.iter().map(WindowRecord::count).collect();
        let mids: Vec<f64> = out.iter().map(|r| r.means()[0]).collect();
        assert_eq!(mids, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(counts, vec![2, 2, 2, 2]);
        assert_eq!(out[1].means()[1], 2.5);
    }

    #[test]
    fn weight_expression_is_averaged() {
        let config = AveragerConfig::new(10.0, 1.0);
        let weight = compile("v * 2", &FieldSchema::for_columns(&columns()[..])).unwrap();
        let out: Vec<_> = WindowAverager::new(
            rows(&[(0.0, 1.0), (1.0, 2.0), (20.0, 0.0)]),
            columns(),
            &config,
            weight,
        )
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(out[0].weight(), 3.0);
    }

    #[test]
    fn weight_referencing_rate_fails_on_raw_rows() {
        let config = AveragerConfig::new(10.0, 1.0);
        let weight = compile("rate", &FieldSchema::for_columns(&columns()[..])).unwrap();
        let mut averager =
            WindowAverager::new(rows(&[(0.0, 1.0)]), columns(), &config, weight).unwrap();
        assert!(matches!(averager.next(), Some(Err(AveragerError::Eval(_)))));
        assert!(averager.next().is_none());
    }

    #[test]
    fn rejects_missing_time_column() {
        let config = AveragerConfig::new(10.0, 1.0).with_time_field("t");
        let result = WindowAverager::new(rows(&[]), columns(), &config, CompiledExpr::constant(1.0));
        assert!(matches!(result, Err(AveragerError::MissingTimeField { .. })));
    }
}
