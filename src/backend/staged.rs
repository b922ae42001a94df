// src/backend/staged.rs
//! Byte-array staged backend
//!
//! Events are encoded into a private growable array and, once complete,
//! copied into the hand-off [`EventQueue`]. Every commit finalizes the
//! staging lease (returns 0), so epoch shifts never reach the writer here.
//! Because the drainer appends to whichever chunk is open when it runs,
//! events staged here must not carry constant-pool ids.

use crate::backend::{BackendCapabilities, BufferBackend, Lease};
use crate::observability::STAGED_DROPPED;
use crate::recording::event_queue::{EventQueue, StagedEvent};
use crate::utils::config::StagedSettings;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{trace, warn};

const INITIAL_STAGING_SIZE: usize = 256;

/// Staging array feeding a lock-free queue
pub struct StagedBuffer {
    queue: Arc<EventQueue>,
    region: Vec<u8>,
    max_event_bytes: usize,
    thread_id: u64,
}

impl StagedBuffer {
    pub fn new(queue: Arc<EventQueue>, settings: &StagedSettings, thread_id: u64) -> Self {
        let max_event_bytes = settings.max_event_bytes;
        Self {
            queue,
            region: vec![0; INITIAL_STAGING_SIZE.min(max_event_bytes)],
            max_event_bytes,
            thread_id,
        }
    }

    /// Current size of the staging array
    pub fn staging_len(&self) -> usize {
        self.region.len()
    }
}

impl BufferBackend for StagedBuffer {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            direct_memory: false,
            constant_pool: false,
        }
    }

    fn acquire(&mut self) -> Option<Lease> {
        Some(Lease {
            start: 0,
            max: self.region.len(),
        })
    }

    fn region_mut(&mut self) -> &mut [u8] {
        &mut self.region
    }

    fn flush(&mut self, used: usize, requested: usize) -> Option<Lease> {
        let needed = used.checked_add(requested)?;
        if needed > self.max_event_bytes {
            warn!(
                "Staged event needs {} bytes, limit is {}; invalidating",
                needed, self.max_event_bytes
            );
            return None;
        }

        let grown = needed
            .max(self.region.len() * 2)
            .min(self.max_event_bytes);
        trace!("Growing staging array {} -> {}", self.region.len(), grown);
        self.region.resize(grown, 0);

        Some(Lease {
            start: 0,
            max: self.region.len(),
        })
    }

    fn commit(&mut self, end: usize) -> usize {
        let bytes = Bytes::copy_from_slice(&self.region[..end]);
        if self
            .queue
            .push(StagedEvent::new(self.thread_id, bytes))
            .is_err()
        {
            trace!("Staged queue full, dropping {} byte event", end);
            metrics::counter!(STAGED_DROPPED).increment(1);
        }
        0
    }
}
