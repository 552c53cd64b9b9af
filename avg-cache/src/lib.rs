// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Disk cache for window-averaged streams.
//!
//! Entries are parquet files named after a digest of the [`AggregationRequest`]. An entry
//! is written to a `.partial` file under an exclusive per-key lock and becomes visible only
//! through an atomic rename once the whole stream has been produced, so at most one
//! process computes a given key at a time and readers never observe half-written data.

mod cache;
pub mod entry;
mod error;
mod lock;
mod request;
mod stream;

pub use cache::AggregationCache;
pub use error::{CacheError, Result};
pub use lock::KeyLock;
pub use request::{AggregationRequest, CacheKey};
pub use stream::RecordStream;
