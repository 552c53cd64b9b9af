// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{DataType, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{Result, SourceError};
use crate::rows::RowIter;
use crate::{META_TABLE, META_TITLE, META_UNITS};

pub const UNKNOWN_UNIT: &str = "?";

const DEFAULT_BATCH_ROWS: usize = 8192;

/// Split `"<file>:<table path>"`. A missing table path matches any table.
pub fn split_identifier(identifier: &str) -> (&str, &str) {
    match identifier.rsplit_once(':') {
        Some((file, table)) => (file.trim(), table.trim()),
        None => (identifier.trim(), ""),
    }
}

fn normalize_table_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}

/// Open handle to one table. Metadata is read once; every call to [`TableSource::rows`]
/// starts a fresh pass over the file.
#[derive(Debug, Clone)]
pub struct TableSource {
    identifier: String,
    path: PathBuf,
    table_path: Option<String>,
    title: String,
    columns: Arc<[String]>,
    units: Vec<String>,
    index: HashMap<String, usize>,
    row_count: u64,
    batch_rows: usize,
}

impl TableSource {
    /// Resolve `identifier` against `datadir` and read the table's metadata.
    pub fn open(datadir: &Path, identifier: &str) -> Result<Self> {
        let (file, wanted) = split_identifier(identifier);
        if file.is_empty() {
            return Err(SourceError::NotFound {
                identifier: identifier.to_string(),
                reason: "empty file name".to_string(),
            });
        }
        let path = datadir.join(file);
        if !path.is_file() {
            return Err(SourceError::NotFound {
                identifier: identifier.to_string(),
                reason: format!("no such file {}", path.display()),
            });
        }
        let builder = open_builder(&path, identifier)?;
        let schema = builder.schema().clone();
        let row_count = builder.metadata().file_metadata().num_rows().max(0) as u64;
        drop(builder);

        let metadata = schema.metadata();
        let table_path = metadata
            .get(META_TABLE)
            .map(|p| format!("/{}", normalize_table_path(p)));
        let wanted_norm = normalize_table_path(wanted);
        if !wanted_norm.is_empty() {
            let stored = table_path.as_deref().map(normalize_table_path);
            if stored != Some(wanted_norm) {
                return Err(SourceError::NotFound {
                    identifier: identifier.to_string(),
                    reason: format!(
                        "{} holds table {}",
                        path.display(),
                        table_path.as_deref().unwrap_or("<untagged>")
                    ),
                });
            }
        }

        let columns = check_columns(&schema, identifier)?;
        let units = read_units(metadata, columns.len(), identifier)?;
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let title = metadata.get(META_TITLE).cloned().unwrap_or_default();

        Ok(Self {
            identifier: identifier.trim().to_string(),
            path,
            table_path,
            title,
            columns: columns.into(),
            units,
            index,
            row_count,
            batch_rows: DEFAULT_BATCH_ROWS,
        })
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Internal table path stored in the file, `None` for files without a table tag.
    pub fn table_path(&self) -> Option<&str> {
        self.table_path.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Unit of the column named exactly `expression` (after trimming), `"?"` otherwise.
    pub fn column_unit(&self, expression: &str) -> &str {
        self.column_index(expression.trim())
            .map(|idx| self.units[idx].as_str())
            .unwrap_or(UNKNOWN_UNIT)
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Single-pass iterator over the rows in storage order.
    pub fn rows(&self) -> Result<RowIter> {
        let builder = open_builder(&self.path, &self.identifier)?;
        let reader = builder.with_batch_size(self.batch_rows).build()?;
        Ok(RowIter::new(
            reader,
            Arc::clone(&self.columns),
            self.identifier.clone(),
        ))
    }
}

fn open_builder(path: &Path, identifier: &str) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).map_err(|err| SourceError::NotFound {
        identifier: identifier.to_string(),
        reason: format!("cannot open {}: {}", path.display(), err),
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|err| SourceError::Format {
        identifier: identifier.to_string(),
        reason: err.to_string(),
    })
}

fn check_columns(schema: &Schema, identifier: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if !is_numeric_like(field.data_type()) {
            return Err(SourceError::Format {
                identifier: identifier.to_string(),
                reason: format!(
                    "column {} has unsupported type {}",
                    field.name(),
                    field.data_type()
                ),
            });
        }
        if names.iter().any(|n| n == field.name()) {
            return Err(SourceError::Format {
                identifier: identifier.to_string(),
                reason: format!("duplicate column {}", field.name()),
            });
        }
        names.push(field.name().clone());
    }
    if names.is_empty() {
        return Err(SourceError::Format {
            identifier: identifier.to_string(),
            reason: "table has no columns".to_string(),
        });
    }
    Ok(names)
}

fn is_numeric_like(data_type: &DataType) -> bool {
    data_type.is_integer() || data_type.is_floating() || *data_type == DataType::Boolean
}

fn read_units(
    metadata: &HashMap<String, String>,
    width: usize,
    identifier: &str,
) -> Result<Vec<String>> {
    let mut units = match metadata.get(META_UNITS) {
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)?,
        None => Vec::new(),
    };
    if !units.is_empty() && units.len() != width {
        log::warn!(
            "table {} carries {} units for {} columns",
            identifier,
            units.len(),
            width
        );
    }
    units.resize(width, UNKNOWN_UNIT.to_string());
    for unit in units.iter_mut() {
        if unit.is_empty() {
            *unit = UNKNOWN_UNIT.to_string();
        }
    }
    Ok(units)
}
