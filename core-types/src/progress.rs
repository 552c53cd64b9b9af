// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Fractional progress reporting. The caller owns the sink and hands it to the streaming
//! code; observers poll it from elsewhere.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives fractional progress in `[0, 1]`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);

    /// Called once at the start of a request.
    fn reset(&self) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64) {}
}

/// Lock-free progress cell readable by a poller thread. Values only move forward until reset.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    bits: AtomicU64,
}

impl AtomicProgress {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn is_done(&self) -> bool {
        self.value() >= 1.0
    }
}

impl ProgressSink for AtomicProgress {
    fn report(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        // non-negative IEEE doubles order the same as their bit patterns
        let clamped = fraction.clamp(0.0, 1.0);
        self.bits.fetch_max(clamped.to_bits(), Ordering::Relaxed);
    }

    fn reset(&self) {
        self.bits.store(0f64.to_bits(), Ordering::Relaxed);
    }
}

/// Maps per-source row counts onto a slice `[base, base + span]` of the overall range.
pub struct ProgressScope<'a> {
    sink: &'a dyn ProgressSink,
    base: f64,
    span: f64,
    total_rows: u64,
    last: f64,
}

impl<'a> ProgressScope<'a> {
    pub fn new(sink: &'a dyn ProgressSink, base: f64, span: f64, total_rows: u64) -> Self {
        Self {
            sink,
            base,
            span,
            total_rows,
            last: base,
        }
    }

    /// Full-range scope, as used by a single-source request.
    pub fn whole(sink: &'a dyn ProgressSink, total_rows: u64) -> Self {
        Self::new(sink, 0.0, 1.0, total_rows)
    }

    pub fn set_total_rows(&mut self, total_rows: u64) {
        self.total_rows = total_rows;
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn rows_done(&mut self, rows: u64) {
        if self.total_rows == 0 {
            return;
        }
        let frac = (rows as f64 / self.total_rows as f64).min(1.0);
        let value = self.base + self.span * frac;
        if value > self.last {
            self.last = value;
            self.sink.report(value);
        }
    }

    pub fn complete(&mut self) {
        let value = self.base + self.span;
        if value > self.last {
            self.last = value;
            self.sink.report(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn atomic_progress_is_monotonic_until_reset() {
        let progress = AtomicProgress::new();
        progress.report(0.4);
        progress.report(0.2);
        assert_eq!(progress.value(), 0.4);
        progress.report(1.5);
        assert!(progress.is_done());
        progress.reset();
        assert_eq!(progress.value(), 0.0);
    }

    #[test]
    fn scope_maps_rows_into_its_slice() {
        let seen = Mutex::new(Vec::new());
        let sink = |v: f64| seen.lock().unwrap().push(v);
        let mut scope = ProgressScope::new(&sink, 0.5, 0.5, 10);
        scope.rows_done(5);
        scope.rows_done(5);
        scope.rows_done(2);
        scope.complete();
        assert_eq!(*seen.lock().unwrap(), vec![0.75, 1.0]);
    }

    #[test]
    fn empty_scope_reports_only_completion() {
        let progress = AtomicProgress::new();
        let mut scope = ProgressScope::whole(&progress, 0);
        scope.rows_done(10);
        assert_eq!(progress.value(), 0.0);
        scope.complete();
        assert_eq!(progress.value(), 1.0);
    }
}
