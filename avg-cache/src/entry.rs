// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aggregations::{RecordSchema, WindowRecord};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use crc32fast::Hasher as Crc32;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::{CacheError, Result};

pub const META_SOURCE: &str = "ctplot.source";

/// Arrow layout of a cache entry: column means, `count` as Int64, `weight`, `rate`.
pub fn entry_schema(schema: &RecordSchema, identifier: &str) -> Schema {
    let mut fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|name| Field::new(name, DataType::Float64, true))
        .collect();
    fields.push(Field::new("count", DataType::Int64, false));
    fields.push(Field::new("weight", DataType::Float64, true));
    fields.push(Field::new("rate", DataType::Float64, false));
    let mut metadata = HashMap::new();
    metadata.insert(META_SOURCE.to_string(), identifier.to_string());
    Schema::new_with_metadata(fields, metadata)
}

pub fn checksum_path(entry: &Path) -> PathBuf {
    with_suffix(entry, "crc")
}

pub fn partial_path(entry: &Path) -> PathBuf {
    with_suffix(entry, "partial")
}

pub fn lock_path(entry: &Path) -> PathBuf {
    with_suffix(entry, "lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

pub fn compute_checksum(path: &Path) -> Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = Crc32::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Remove an entry together with its checksum sidecar. Missing files are ignored.
pub fn remove_entry(entry: &Path) -> Result<()> {
    for path in [entry.to_path_buf(), checksum_path(entry)] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Streams records into `<entry>.partial`; [`EntryWriter::commit`] publishes the entry.
pub struct EntryWriter {
    partial: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    columns: Vec<Vec<f64>>,
    counts: Vec<i64>,
    batch_rows: usize,
    rows: u64,
}

impl EntryWriter {
    pub fn create(
        partial: &Path,
        schema: &RecordSchema,
        identifier: &str,
        batch_rows: usize,
    ) -> Result<Self> {
        let arrow_schema = Arc::new(entry_schema(schema, identifier));
        let file = File::create(partial)?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&arrow_schema), None)?;
        let batch_rows = batch_rows.max(1);
        Ok(Self {
            partial: partial.to_path_buf(),
            schema: arrow_schema,
            writer,
            columns: vec![Vec::with_capacity(batch_rows); schema.width() - 1],
            counts: Vec::with_capacity(batch_rows),
            batch_rows,
            rows: 0,
        })
    }

    pub fn push(&mut self, record: &WindowRecord) -> Result<()> {
        let row = record.as_row();
        let count_idx = row.len() - 3;
        if row.len() != self.columns.len() + 1 {
            return Err(CacheError::Corrupt {
                path: self.partial.clone(),
                reason: format!("record has {} fields, expected {}", row.len(), self.columns.len() + 1),
            });
        }
        let mut out = self.columns.iter_mut();
        for (idx, value) in row.iter().enumerate() {
            if idx == count_idx {
                self.counts.push(record.count() as i64);
            } else if let Some(col) = out.next() {
                col.push(*value);
            }
        }
        self.rows += 1;
        if self.counts.len() >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.counts.is_empty() {
            return Ok(());
        }
        let count_idx = self.columns.len() - 2;
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 1);
        for (idx, col) in self.columns.iter_mut().enumerate() {
            if idx == count_idx {
                arrays.push(Arc::new(Int64Array::from(std::mem::take(&mut self.counts))));
            }
            arrays.push(Arc::new(Float64Array::from(std::mem::take(col))));
        }
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)?;
        self.writer.write(&batch)?;
        Ok(())
    }

    /// Close the partial file, write its checksum and rename it to `entry`.
    pub fn commit(mut self, entry: &Path) -> Result<u64> {
        self.flush()?;
        self.writer.close()?;
        let checksum = compute_checksum(&self.partial)?;
        std::fs::write(checksum_path(entry), format!("{:08x}\n", checksum))?;
        std::fs::rename(&self.partial, entry)?;
        Ok(self.rows)
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial
    }
}

/// Reads a complete entry after checking its checksum and layout.
pub struct EntryReader {
    path: PathBuf,
    reader: ParquetRecordBatchReader,
    rows: u64,
    batch: Vec<Float64Array>,
    counts: Option<Int64Array>,
    count_idx: usize,
    cursor: usize,
    batch_len: usize,
    done: bool,
}

impl EntryReader {
    pub fn open(entry: &Path, schema: &RecordSchema) -> Result<Self> {
        let corrupt = |reason: String| CacheError::Corrupt {
            path: entry.to_path_buf(),
            reason,
        };
        let expected = std::fs::read_to_string(checksum_path(entry))
            .map_err(|err| corrupt(format!("missing checksum: {}", err)))?;
        let expected = u32::from_str_radix(expected.trim(), 16)
            .map_err(|err| corrupt(format!("bad checksum: {}", err)))?;
        let actual = compute_checksum(entry)?;
        if actual != expected {
            return Err(corrupt(format!(
                "checksum {:08x} does not match {:08x}",
                actual, expected
            )));
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(entry)?)
            .map_err(|err| corrupt(err.to_string()))?;
        let found: Vec<&str> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        let wanted: Vec<&str> = schema.field_names().collect();
        if found != wanted {
            return Err(corrupt(format!("fields {:?}, expected {:?}", found, wanted)));
        }
        let rows = builder.metadata().file_metadata().num_rows().max(0) as u64;
        let reader = builder.build()?;
        Ok(Self {
            path: entry.to_path_buf(),
            reader,
            rows,
            batch: Vec::new(),
            counts: None,
            count_idx: schema.columns().len(),
            cursor: 0,
            batch_len: 0,
            done: false,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn load(&mut self, batch: RecordBatch) -> Result<()> {
        self.batch.clear();
        self.counts = None;
        for (idx, column) in batch.columns().iter().enumerate() {
            if idx == self.count_idx {
                let counts = column
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| self.corrupt("count column not i64"))?;
                self.counts = Some(counts.clone());
            } else {
                let values = column
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| self.corrupt(format!("column {} not f64", idx)))?;
                self.batch.push(values.clone());
            }
        }
        self.cursor = 0;
        self.batch_len = batch.num_rows();
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> CacheError {
        CacheError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn value(col: &Float64Array, row: usize) -> f64 {
        if col.is_null(row) { f64::NAN } else { col.value(row) }
    }
}

impl Iterator for EntryReader {
    type Item = Result<WindowRecord>;

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
        let Some(counts) = self.counts.as_ref() else {
            self.done = true;
            return Some(Err(self.corrupt("count column missing")));
        };
        let row = self.cursor;
        let mut values = Vec::with_capacity(self.batch.len() + 1);
        for (idx, col) in self.batch.iter().enumerate() {
            if idx == self.count_idx {
                values.push(counts.value(row) as f64);
            }
            values.push(Self::value(col, row));
        }
        self.cursor += 1;
        match WindowRecord::from_row(values) {
            Some(record) => Some(Ok(record)),
            None => {
                self.done = true;
                Some(Err(self.corrupt("short record")))
            }
        }
    }
}
