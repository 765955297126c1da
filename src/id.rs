//! Unique ID Generator
//!
//! Strictly increasing 64-bit ids that approximate issuance time in
//! nanoseconds since the Unix epoch.
//!
//! The last issued value lives in an `Arc<AtomicU64>` owned by the database
//! handle. Every clone of the generator shares that cell, so ids are unique
//! across all components of one database instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lock-free monotonic id source
///
/// ## Algorithm
/// 1. Read wall time `now` and the last issued value `last`
/// 2. Candidate is `now` if `now > last`, else `last + 1`
/// 3. Publish the candidate with compare-and-swap; retry on contention
///
/// During bursts faster than clock resolution the ids form a tight run just
/// above the last real timestamp.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    /// Last issued id (shared)
    last: Arc<AtomicU64>,
}

impl IdGenerator {
    /// Create a generator seeded from the current wall clock
    pub fn new() -> Self {
        Self::with_cell(Arc::new(AtomicU64::new(now_nanos())))
    }

    /// Create a generator over an existing shared cell
    pub fn with_cell(last: Arc<AtomicU64>) -> Self {
        Self { last }
    }

    /// Issue the next id
    pub fn next_id(&self) -> u64 {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let now = now_nanos();
            let candidate = if now > current {
                now
            } else {
                current.saturating_add(1)
            };

            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }

    /// The last id issued (or the seed if none has been issued yet)
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock nanoseconds since the Unix epoch (0 if the clock is before it)
fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
