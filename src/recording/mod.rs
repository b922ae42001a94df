// src/recording/mod.rs
//! Shared recording stream
//!
//! - **Recorder**: chunked recording with an atomic epoch; rotation seals the
//!   open chunk and retires every outstanding buffer lease
//! - **Event Queue**: lock-free MPMC hand-off for staged events
//! - **Clock**: process-wide tick source for event timestamps
//!
//! # Architecture
//!
//! ```text
//! EventWriter ─▶ ThreadBuffer ──commit(epoch check)──────────▶ Recording
//!                                                               ▲   │
//! EventWriter ─▶ StagedBuffer ─▶ EventQueue ─▶ StagedDrainer ───┘   │
//!                                                               rotate()
//!                                                          (epoch shift)
//! ```

pub mod clock;
pub mod event_queue;
pub mod recorder;

pub use event_queue::{EventQueue, QueueStats, StagedEvent};
pub use recorder::{Chunk, Recording, RecorderStatsSnapshot, StagedDrainer, FIRST_EPOCH};
