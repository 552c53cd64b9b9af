// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::error::{Result, SourceError};
use crate::{META_TABLE, META_TITLE, META_UNITS};

/// Descriptive metadata written alongside a table's columns.
#[derive(Debug, Clone, Default)]
pub struct TableMeta {
    pub table_path: String,
    pub title: String,
    pub columns: Vec<String>,
    pub units: Vec<String>,
}

impl TableMeta {
    pub fn new<S: AsRef<str>>(table_path: &str, columns: &[S]) -> Self {
        Self {
            table_path: table_path.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_units<S: AsRef<str>>(mut self, units: &[S]) -> Self {
        self.units = units.iter().map(|u| u.as_ref().to_string()).collect();
        self
    }

    /// Arrow schema with every column as nullable `Float64` and the table metadata attached.
    pub fn schema(&self) -> Result<Schema> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|name| Field::new(name, DataType::Float64, true))
            .collect();
        Ok(Schema::new_with_metadata(fields, self.metadata()?))
    }

    pub fn metadata(&self) -> Result<HashMap<String, String>> {
        let mut metadata = HashMap::new();
        metadata.insert(META_TABLE.to_string(), self.table_path.clone());
        metadata.insert(META_TITLE.to_string(), self.title.clone());
        if !self.units.is_empty() {
            metadata.insert(META_UNITS.to_string(), serde_json::to_string(&self.units)?);
        }
        Ok(metadata)
    }
}

/// Writes a table file in the layout [`crate::TableSource`] reads.
pub struct TableWriter {
    path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    rows: u64,
}

impl TableWriter {
    pub fn create(path: &Path, meta: &TableMeta) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let schema = Arc::new(meta.schema()?);
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), None)?;
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            rows: 0,
        })
    }

    /// Append rows as one record batch; each row must match the column count.
    pub fn write_rows<R: AsRef<[f64]>>(&mut self, rows: &[R]) -> Result<()> {
        let width = self.schema.fields().len();
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); width];
        for (idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(SourceError::Format {
                    identifier: self.path.display().to_string(),
                    reason: format!("row {} has {} values, expected {}", idx, row.len(), width),
                });
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(*value);
            }
        }
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)?;
        self.writer.write(&batch)?;
        self.rows += rows.len() as u64;
        Ok(())
    }

    /// Flush and close the file, returning the number of rows written.
    pub fn finish(self) -> Result<u64> {
        self.writer.close()?;
        log::debug!("wrote {} rows to {}", self.rows, self.path.display());
        Ok(self.rows)
    }
}
