// src/backend/mod.rs
//! Buffer / commit backends
//!
//! The event writer never owns memory. It keeps three offsets into the
//! region a backend leases to it and asks the backend for more room, or to
//! publish a finished event, through [`BufferBackend`].
//!
//! - **ThreadBuffer**: direct in-process buffer that publishes straight into
//!   the shared recording and detects epoch shifts at commit
//! - **StagedBuffer**: byte-array staging area that hands each finished event
//!   to a lock-free queue drained in the background
//!
//! # Commit contract
//!
//! `commit(end)` returns the offset the next event starts at:
//!
//! | returned         | meaning                                            |
//! |------------------|----------------------------------------------------|
//! | `end`            | appended, next event continues contiguously        |
//! | `0`              | lease finalized and recycled, acquire a new one    |
//! | anything else    | epoch shift, event discarded, retry from there     |

pub mod staged;
pub mod thread_buffer;

pub use staged::StagedBuffer;
pub use thread_buffer::ThreadBuffer;

/// A writable window `[start, max)` inside a backend's region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub start: usize,
    pub max: usize,
}

impl Lease {
    pub fn capacity(&self) -> usize {
        self.max.saturating_sub(self.start)
    }
}

/// What a backend can offer the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Events land directly in recording memory rather than a staging copy
    pub direct_memory: bool,

    /// Pool ids written by the event are resolvable where it ends up
    pub constant_pool: bool,
}

/// Supplies space to an event writer and publishes its finished events
pub trait BufferBackend {
    fn capabilities(&self) -> BackendCapabilities;

    /// Hand out a fresh lease, `None` if no memory is available
    fn acquire(&mut self) -> Option<Lease>;

    /// The leased memory; writer offsets index into this slice
    fn region_mut(&mut self) -> &mut [u8];

    /// Make room for `requested` more bytes after the `used` bytes of the
    /// event in progress. The in-progress bytes are relocated to the start
    /// of the returned lease. `None` invalidates the session.
    fn flush(&mut self, used: usize, requested: usize) -> Option<Lease>;

    /// Publish `[start, end)` of the current lease; see the module docs for
    /// the meaning of the returned offset
    fn commit(&mut self, end: usize) -> usize;
}
