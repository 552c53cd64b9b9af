// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::source::TableSource;

/// Summary of one table for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub title: String,
    pub colnames: Vec<String>,
    pub units: Vec<String>,
    pub rows: u64,
}

/// Every tagged table file under `datadir`, keyed by its source identifier.
/// Files that fail to open are skipped with a warning.
pub fn available_tables(datadir: &Path) -> Result<BTreeMap<String, TableSpec>> {
    let mut files = Vec::new();
    collect_parquet_files(datadir, &mut files)?;
    files.sort();

    let mut tables = BTreeMap::new();
    for file in files {
        let Ok(relative) = file.strip_prefix(datadir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let source = match TableSource::open(datadir, &relative) {
            Ok(source) => source,
            Err(err) => {
                log::warn!("skipping {}: {}", file.display(), err);
                continue;
            }
        };
        let Some(table_path) = source.table_path() else {
            log::debug!("skipping untagged parquet file {}", file.display());
            continue;
        };
        tables.insert(
            format!("{}:{}", relative, table_path),
            TableSpec {
                title: source.title().to_string(),
                colnames: source.columns().to_vec(),
                units: source.units().to_vec(),
                rows: source.row_count(),
            },
        );
    }
    Ok(tables)
}

fn collect_parquet_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_parquet_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}
