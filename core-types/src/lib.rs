// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared configuration, lock backoff policy, and progress reporting for the plotting core.

pub mod config;
pub mod progress;
pub mod retry;

pub use self::config::AppConfig;
pub use progress::{AtomicProgress, NoProgress, ProgressScope, ProgressSink};
pub use retry::{LockRetryPolicy, RetryError};
