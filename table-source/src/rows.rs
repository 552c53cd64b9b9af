// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::sync::Arc;

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReader;

use crate::error::{Result, SourceError};

/// One table row, widened to `f64`. Nulls read as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<f64>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx).copied()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Forward-only row stream over one parquet file. Dropping it closes the file.
pub struct RowIter {
    reader: ParquetRecordBatchReader,
    columns: Arc<[String]>,
    identifier: String,
    batch: Vec<Float64Array>,
    cursor: usize,
    batch_len: usize,
    rows_read: u64,
    done: bool,
}

impl RowIter {
    pub(crate) fn new(
        reader: ParquetRecordBatchReader,
        columns: Arc<[String]>,
        identifier: String,
    ) -> Self {
        Self {
            reader,
            columns,
            identifier,
            batch: Vec::new(),
            cursor: 0,
            batch_len: 0,
            rows_read: 0,
            done: false,
        }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn load(&mut self, batch: RecordBatch) -> Result<()> {
        if batch.num_columns() != self.columns.len() {
            return Err(SourceError::Format {
                identifier: self.identifier.clone(),
                reason: format!(
                    "batch has {} columns, expected {}",
                    batch.num_columns(),
                    self.columns.len()
                ),
            });
        }
        self.batch.clear();
        for column in batch.columns() {
            let widened = cast(column, &DataType::Float64)?;
            let values = widened
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| SourceError::Format {
                    identifier: self.identifier.clone(),
                    reason: "column did not widen to f64".to_string(),
                })?
                .clone();
            self.batch.push(values);
        }
        self.cursor = 0;
        self.batch_len = batch.num_rows();
        Ok(())
    }
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.cursor >= self.batch_len {
            match self.reader.next() {
                Some(Ok(batch)) => {
                    if let Err(err) = self.load(batch) {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
        let row = self.cursor;
        let values = self
            .batch
            .iter()
            .map(|col| if col.is_null(row) { f64::NAN } else { col.value(row) })
            .collect();
        self.cursor += 1;
        self.rows_read += 1;
        Some(Ok(Row::new(Arc::clone(&self.columns), values)))
    }
}
