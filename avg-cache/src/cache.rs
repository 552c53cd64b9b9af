// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::{Path, PathBuf};

use aggregations::{RecordSchema, WindowRecord};
use core_types::{AppConfig, LockRetryPolicy, ProgressScope};

use crate::entry::{EntryReader, EntryWriter, lock_path, partial_path, remove_entry};
use crate::error::{CacheError, Result};
use crate::lock::KeyLock;
use crate::request::{AggregationRequest, CacheKey};
use crate::stream::{PendingEntry, RecordStream};

/// Disk-backed store of averaged streams keyed by [`AggregationRequest`].
#[derive(Debug, Clone)]
pub struct AggregationCache {
    cachedir: Option<PathBuf>,
    scratch: PathBuf,
    policy: LockRetryPolicy,
    batch_rows: usize,
}

impl AggregationCache {
    /// `None` disables persistence; locks and transient files then live in the system
    /// temp directory.
    pub fn new(cachedir: Option<PathBuf>) -> Self {
        Self {
            cachedir: cachedir.filter(|dir| !dir.as_os_str().is_empty()),
            scratch: std::env::temp_dir(),
            policy: LockRetryPolicy::default(),
            batch_rows: 4096,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache_dir().map(Path::to_path_buf))
            .with_lock_policy(config.lock_policy())
            .with_batch_rows(config.cache_batch_rows)
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = dir.into();
        self
    }

    pub fn with_lock_policy(mut self, policy: LockRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.cachedir.is_some()
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cachedir
            .as_deref()
            .unwrap_or(&self.scratch)
            .join(key.file_name())
    }

    /// Stream the averaged records for `request`, reading a complete entry when one exists
    /// and otherwise running `compute` under the key's lock while persisting its output.
    ///
    /// `compute` receives the progress scope; a cached read reports progress itself.
    pub fn get_or_compute<'a, F, I>(
        &self,
        request: &AggregationRequest,
        schema: &RecordSchema,
        progress: ProgressScope<'a>,
        compute: F,
    ) -> Result<RecordStream<'a>>
    where
        F: FnOnce(ProgressScope<'a>) -> aggregations::Result<I>,
        I: Iterator<Item = aggregations::Result<WindowRecord>> + 'a,
    {
        let key = request.key();
        let entry = self.entry_path(&key);
        log::debug!("cache entry for {} is {}", request.identifier, entry.display());

        if self.is_enabled() {
            if let Some(reader) = self.open_complete(&entry, schema, false) {
                return Ok(RecordStream::cached(key, reader, progress));
            }
        }

        if let Some(dir) = entry.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let lock = KeyLock::acquire(&lock_path(&entry), &key, &self.policy)?;

        let pending = if self.is_enabled() {
            // another writer may have finished while we waited
            if let Some(reader) = self.open_complete(&entry, schema, true) {
                drop(lock);
                return Ok(RecordStream::cached(key, reader, progress));
            }
            let partial = partial_path(&entry);
            let writer = EntryWriter::create(&partial, schema, &request.identifier, self.batch_rows)
                .map_err(|err| {
                    log::error!("failed opening {}: {}", partial.display(), err);
                    CacheError::Compute {
                        key: key.clone(),
                        reason: err.to_string(),
                    }
                })?;
            log::debug!("caching averaged data in {}", entry.display());
            Some(PendingEntry::new(writer, &entry))
        } else {
            remove_entry(&entry)?;
            None
        };

        let records = compute(progress)?;
        Ok(RecordStream::computed(key, Box::new(records), pending, lock))
    }

    /// Open a complete entry. Corrupt entries are logged and, when `remove_corrupt` is set
    /// (only while holding the lock), deleted so the caller recomputes them.
    fn open_complete(
        &self,
        entry: &Path,
        schema: &RecordSchema,
        remove_corrupt: bool,
    ) -> Option<EntryReader> {
        if !entry.exists() {
            return None;
        }
        match EntryReader::open(entry, schema) {
            Ok(reader) => {
                log::info!("reading averaged data from cache {}", entry.display());
                Some(reader)
            }
            Err(err) => {
                log::warn!("unusable cache entry {}: {}", entry.display(), err);
                if remove_corrupt {
                    if let Err(err) = remove_entry(entry) {
                        log::warn!("failed to remove {}: {}", entry.display(), err);
                    }
                }
                None
            }
        }
    }
}
