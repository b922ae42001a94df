// src/backend/thread_buffer.rs
//! Direct in-process buffer
//!
//! Layout of the region:
//!
//! ```text
//! 0        8                start                 end        len
//! ┌────────┬───────────────────┬──────────────────┬───────────┐
//! │ epoch  │ published events  │ event in progress│   free    │
//! └────────┴───────────────────┴──────────────────┴───────────┘
//! ```
//!
//! The first eight bytes hold the epoch the lease was taken in, so no event
//! ever starts at offset 0 and a commit result of 0 is unambiguous. A
//! commit publishes the in-progress bytes into the recording only if that
//! epoch is still current; otherwise the lease is retired, re-stamped with
//! the current epoch, and the writer is sent back to offset 8.
//!
//! An event that cannot fit in the buffer at all gets a one-off oversized
//! lease. Committing it finalizes the lease and returns 0.

use crate::backend::{BackendCapabilities, BufferBackend, Lease};
use crate::observability::{EPOCH_SHIFTS, LEASES_GRANTED};
use crate::recording::recorder::Recording;
use crate::utils::config::ThreadBufferSettings;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Bytes reserved at the front of every region for the lease epoch
pub const HEADER_SIZE: usize = 8;

/// Per-thread buffer publishing directly into a shared [`Recording`]
pub struct ThreadBuffer {
    recording: Arc<Recording>,
    region: Vec<u8>,
    size: usize,
    max_lease_size: usize,
    start: usize,
    leased: bool,
}

impl ThreadBuffer {
    pub fn new(recording: Arc<Recording>, settings: &ThreadBufferSettings) -> Self {
        let size = settings.size.max(HEADER_SIZE + 1);
        let mut buffer = Self {
            recording,
            region: vec![0; size],
            size,
            max_lease_size: settings.max_lease_size.max(size),
            start: HEADER_SIZE,
            leased: false,
        };
        buffer.stamp_current_epoch();
        buffer
    }

    /// Epoch this lease was taken in
    pub fn lease_epoch(&self) -> u64 {
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&self.region[..HEADER_SIZE]);
        u64::from_le_bytes(header)
    }

    /// Whether a one-off oversized lease is active
    pub fn is_leased(&self) -> bool {
        self.leased
    }

    /// Offset the next event will start at
    pub fn start(&self) -> usize {
        self.start
    }

    fn stamp_current_epoch(&mut self) {
        let epoch = self.recording.epoch();
        self.region[..HEADER_SIZE].copy_from_slice(&epoch.to_le_bytes());
    }

    fn release_lease(&mut self) {
        if self.leased {
            trace!("Releasing oversized lease of {} bytes", self.region.len());
            self.region.truncate(self.size);
            self.region.shrink_to_fit();
            self.leased = false;
        }
        self.start = HEADER_SIZE;
    }

    fn current_lease(&self) -> Lease {
        Lease {
            start: self.start,
            max: self.region.len(),
        }
    }
}

impl BufferBackend for ThreadBuffer {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            direct_memory: true,
            constant_pool: true,
        }
    }

    fn acquire(&mut self) -> Option<Lease> {
        self.release_lease();
        self.stamp_current_epoch();
        Some(self.current_lease())
    }

    fn region_mut(&mut self) -> &mut [u8] {
        &mut self.region
    }

    fn flush(&mut self, used: usize, requested: usize) -> Option<Lease> {
        let needed = HEADER_SIZE
            .checked_add(used)
            .and_then(|n| n.checked_add(requested))?;

        if needed > self.region.len() {
            if needed > self.max_lease_size {
                warn!(
                    "Event needs {} bytes, above the {} byte lease limit; invalidating",
                    needed, self.max_lease_size
                );
                return None;
            }
            let grown = needed.next_power_of_two().min(self.max_lease_size);
            debug!("Granting oversized lease of {} bytes", grown);
            metrics::counter!(LEASES_GRANTED).increment(1);
            self.region.resize(grown, 0);
            self.leased = true;
        }

        // Published bytes before `start` are no longer needed
        if self.start != HEADER_SIZE {
            self.region
                .copy_within(self.start..self.start + used, HEADER_SIZE);
            self.start = HEADER_SIZE;
        }

        trace!("Flushed {} in-progress bytes, {} requested", used, requested);
        Some(self.current_lease())
    }

    fn commit(&mut self, end: usize) -> usize {
        debug_assert!(self.start <= end && end <= self.region.len());

        let epoch = self.lease_epoch();
        if self.recording.append(epoch, &self.region[self.start..end]) {
            if self.leased {
                self.release_lease();
                return 0;
            }
            self.start = end;
            return end;
        }

        debug!(
            "Epoch shift: lease from epoch {} retired, {} bytes discarded",
            epoch,
            end - self.start
        );
        metrics::counter!(EPOCH_SHIFTS).increment(1);
        self.release_lease();
        self.stamp_current_epoch();
        HEADER_SIZE
    }
}
