// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use core_types::{LockRetryPolicy, RetryError};

use crate::error::{CacheError, Result};
use crate::request::CacheKey;

/// Exclusive advisory lock on `<entry>.lock`, released on drop.
///
/// The lock file itself is left in place; removing it would race with waiters that
/// already opened it.
#[derive(Debug)]
pub struct KeyLock {
    file: File,
    path: PathBuf,
}

impl KeyLock {
    pub fn acquire(path: &Path, key: &CacheKey, policy: &LockRetryPolicy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        let outcome = policy.poll_blocking(|attempt| match file.try_lock() {
            Ok(()) => Ok(Some(())),
            Err(TryLockError::WouldBlock) => {
                if attempt == 0 {
                    log::warn!("cache {} is locked by another writer, waiting", key);
                }
                Ok(None)
            }
            Err(TryLockError::Error(err)) => Err(err),
        });
        match outcome {
            Ok(()) => {
                log::debug!("acquired {}", path.display());
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(RetryError::Failed(err)) => Err(CacheError::Io(err)),
            Err(RetryError::TimedOut { attempts, waited }) => {
                log::warn!(
                    "gave up on cache lock {} after {} attempts ({:?})",
                    key,
                    attempts,
                    waited
                );
                Err(CacheError::LockTimeout {
                    key: key.clone(),
                    waited,
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::warn!("failed to unlock {}: {}", self.path.display(), err);
        }
    }
}
