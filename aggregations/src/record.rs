// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::sync::Arc;

use expr::{FieldSchema, SYNTHETIC_FIELDS};

/// Layout of averaged rows: the source columns followed by `count`, `weight`, `rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    columns: Arc<[String]>,
}

impl RecordSchema {
    pub fn new(columns: Arc<[String]>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Number of values in one record row.
    pub fn width(&self) -> usize {
        self.columns.len() + SYNTHETIC_FIELDS.len()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(SYNTHETIC_FIELDS.iter().copied())
    }

    pub fn field_schema(&self) -> FieldSchema {
        FieldSchema::for_averaged(&self.columns[..])
    }
}

/// One averaged window: per-column means, then `count`, `weight` and `rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    values: Vec<f64>,
}

impl WindowRecord {
    pub fn new(mut means: Vec<f64>, count: u64, weight: f64, rate: f64) -> Self {
        means.extend([count as f64, weight, rate]);
        Self { values: means }
    }

    /// Rebuild from a full row as produced by [`WindowRecord::as_row`].
    pub fn from_row(values: Vec<f64>) -> Option<Self> {
        (values.len() >= SYNTHETIC_FIELDS.len()).then_some(Self { values })
    }

    fn split(&self) -> usize {
        self.values.len() - SYNTHETIC_FIELDS.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.values[..self.split()]
    }

    pub fn count(&self) -> u64 {
        self.values[self.split()] as u64
    }

    pub fn weight(&self) -> f64 {
        self.values[self.split() + 1]
    }

    pub fn rate(&self) -> f64 {
        self.values[self.split() + 2]
    }

    /// Row laid out for [`RecordSchema::field_schema`].
    pub fn as_row(&self) -> &[f64] {
        &self.values
    }

    pub fn into_row(self) -> Vec<f64> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_matches_schema() {
        let schema = RecordSchema::new(vec!["time".to_string(), "p".to_string()].into());
        let record = WindowRecord::new(vec![5.0, 1000.0], 3, 1.0, 0.3);
        assert_eq!(record.as_row().len(), schema.width());
        assert_eq!(record.count(), 3);
        assert_eq!(record.means(), &[5.0, 1000.0]);

        let fields = schema.field_schema();
        assert_eq!(fields.slot("rate"), Some(4));
        assert_eq!(
            schema.field_names().collect::<Vec<_>>(),
            vec!["time", "p", "count", "weight", "rate"]
        );
    }

    #[test]
    fn short_rows_are_not_records() {
        assert!(WindowRecord::from_row(vec![1.0, 2.0]).is_none());
        assert!(WindowRecord::from_row(vec![1.0, 2.0, 3.0]).is_some());
    }
}
