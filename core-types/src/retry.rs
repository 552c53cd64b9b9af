// Copyright (c) James Kassemi, SC, US. All rights reserved.
use rand::Rng;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Jittered exponential backoff for polling a contended resource, bounded by an overall
/// timeout instead of an attempt count.
#[derive(Debug, Clone)]
pub struct LockRetryPolicy {
    pub timeout: Option<Duration>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed outright; no further attempts were made.
    Failed(E),
    TimedOut { attempts: usize, waited: Duration },
}

impl LockRetryPolicy {
    /// Delays are clamped to at least 1 ms, the cap to at least the base delay and the
    /// jitter fraction to `[0, 1]`.
    pub fn new(
        timeout: Option<Duration>,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_pct: f64,
    ) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            timeout,
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// Waits as long as it takes.
    pub fn unbounded() -> Self {
        Self::new(None, 50, 2_000, 0.2)
    }

    /// Sleep before poll number `attempt + 1`: the base delay doubled per attempt, capped,
    /// then spread by up to `jitter_pct` either way.
    fn next_delay(&self, attempt: usize) -> Duration {
        let doubled = 1u64
            .checked_shl(attempt.min(63) as u32)
            .map_or(u64::MAX, |factor| self.base_delay_ms.saturating_mul(factor));
        let capped = doubled.min(self.max_delay_ms);
        if self.jitter_pct == 0.0 {
            return Duration::from_millis(capped);
        }
        let spread = (capped as f64 * self.jitter_pct) as i64;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(capped.saturating_add_signed(offset))
    }

    /// Poll `op` until it yields a value. `Ok(None)` means "not yet", errors abort immediately.
    pub fn poll_blocking<F, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Result<Option<T>, E>,
    {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(Some(val)) => return Ok(val),
                Ok(None) => {}
                Err(err) => return Err(RetryError::Failed(err)),
            }
            attempt += 1;
            let mut delay = self.next_delay(attempt - 1);
            if let Some(timeout) = self.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(RetryError::TimedOut {
                        attempts: attempt,
                        waited,
                    });
                }
                delay = delay.min(timeout - waited);
            }
            sleep(delay);
        }
    }
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(300)), 50, 2_000, 0.2)
    }
}
