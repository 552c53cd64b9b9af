// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::{Path, PathBuf};

use aggregations::WindowRecord;
use core_types::ProgressScope;

use crate::entry::{EntryReader, EntryWriter};
use crate::error::Result;
use crate::lock::KeyLock;
use crate::request::CacheKey;

pub(crate) type BoxedRecords<'a> =
    Box<dyn Iterator<Item = aggregations::Result<WindowRecord>> + 'a>;

/// Entry being written while records stream out. The partial file is removed on drop,
/// so an abandoned or failed pass never leaves anything that looks complete.
pub(crate) struct PendingEntry {
    writer: Option<EntryWriter>,
    partial: PathBuf,
    entry: PathBuf,
}

impl PendingEntry {
    pub(crate) fn new(writer: EntryWriter, entry: &Path) -> Self {
        Self {
            partial: writer.partial_path().to_path_buf(),
            writer: Some(writer),
            entry: entry.to_path_buf(),
        }
    }

    fn push(&mut self, record: &WindowRecord) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.push(record),
            None => Ok(()),
        }
    }

    fn commit(mut self) -> Result<u64> {
        match self.writer.take() {
            Some(writer) => writer.commit(&self.entry),
            None => Ok(0),
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        drop(self.writer.take());
        match std::fs::remove_file(&self.partial) {
            Ok(()) => log::debug!("removed unfinished cache entry {}", self.partial.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("failed to remove {}: {}", self.partial.display(), err),
        }
    }
}

enum Source<'a> {
    Cached {
        reader: EntryReader,
        progress: ProgressScope<'a>,
        read: u64,
    },
    Computed {
        records: BoxedRecords<'a>,
        pending: Option<PendingEntry>,
        // dropped last so the partial file is gone before the lock is released
        _lock: KeyLock,
    },
    Finished,
}

/// Averaged records for one request, read from a complete entry or computed on the fly.
///
/// While computing, the key's lock is held until the stream is exhausted or dropped.
pub struct RecordStream<'a> {
    key: CacheKey,
    cached: bool,
    source: Source<'a>,
}

impl<'a> RecordStream<'a> {
    pub(crate) fn cached(key: CacheKey, reader: EntryReader, mut progress: ProgressScope<'a>) -> Self {
        progress.set_total_rows(reader.rows());
        Self {
            key,
            cached: true,
            source: Source::Cached {
                reader,
                progress,
                read: 0,
            },
        }
    }

    pub(crate) fn computed(
        key: CacheKey,
        records: BoxedRecords<'a>,
        pending: Option<PendingEntry>,
        lock: KeyLock,
    ) -> Self {
        Self {
            key,
            cached: false,
            source: Source::Computed {
                records,
                pending,
                _lock: lock,
            },
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether the records come from a complete cache entry.
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<WindowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Cached {
                reader,
                progress,
                read,
            } => match reader.next() {
                Some(Ok(record)) => {
                    *read += 1;
                    progress.rows_done(*read);
                    Some(Ok(record))
                }
                Some(Err(err)) => {
                    self.source = Source::Finished;
                    Some(Err(err))
                }
                None => {
                    progress.complete();
                    self.source = Source::Finished;
                    None
                }
            },
            Source::Computed {
                records, pending, ..
            } => match records.next() {
                Some(Ok(record)) => {
                    if let Some(entry) = pending.as_mut() {
                        if let Err(err) = entry.push(&record) {
                            log::warn!("stopped caching {}: {}", self.key, err);
                            *pending = None;
                        }
                    }
                    Some(Ok(record))
                }
                Some(Err(err)) => {
                    self.source = Source::Finished;
                    Some(Err(err.into()))
                }
                None => {
                    if let Some(entry) = pending.take() {
                        match entry.commit() {
                            Ok(rows) => log::debug!("cached {} averaged rows for {}", rows, self.key),
                            Err(err) => log::warn!("failed to publish cache {}: {}", self.key, err),
                        }
                    }
                    self.source = Source::Finished;
                    None
                }
            },
            Source::Finished => None,
        }
    }
}
