// src/recording/clock.rs
//! Monotonic tick source shared by every writer in the process

use once_cell::sync::Lazy;
use std::time::Instant;

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds since the recording clock origin
#[inline]
pub fn ticks() -> u64 {
    u64::try_from(ORIGIN.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
