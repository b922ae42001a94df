// src/recording/recorder.rs
//! Shared recording stream
//!
//! The recording is a list of chunks. Exactly one chunk is open at a time;
//! [`Recording::rotate`] seals it and opens the next, advancing the global
//! epoch. Appends name the epoch they were written in and are refused if it
//! is no longer current, which is how writers find out their buffer was
//! retired mid-event.

use crate::recording::event_queue::EventQueue;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// First epoch of a new recording. Zero never names a live epoch.
pub const FIRST_EPOCH: u64 = 1;

/// One chunk of the recording
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// Epoch the chunk was written in
    pub epoch: u64,

    /// Concatenated event bytes
    pub data: Vec<u8>,

    /// Number of events appended
    pub events: u64,

    /// String constants registered while this chunk was open
    pub constants: Vec<(u64, String)>,

    /// Whether the chunk has been rotated out
    pub sealed: bool,
}

struct RecordingState {
    chunks: Vec<Chunk>,
}

impl RecordingState {
    fn current(&mut self) -> &mut Chunk {
        // A chunk is pushed in `Recording::new` and on every rotation
        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }
}

/// Shared, rotating recording stream
pub struct Recording {
    epoch: AtomicU64,
    state: Mutex<RecordingState>,
    stats: Arc<RecorderStats>,
}

impl Recording {
    /// Create a recording with one open chunk
    pub fn new() -> Self {
        let first = Chunk {
            epoch: FIRST_EPOCH,
            ..Default::default()
        };

        Self {
            epoch: AtomicU64::new(FIRST_EPOCH),
            state: Mutex::new(RecordingState {
                chunks: vec![first],
            }),
            stats: Arc::new(RecorderStats::default()),
        }
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Append `bytes` written during `epoch`.
    ///
    /// Returns `false`, leaving the stream untouched, if the epoch has moved
    /// on. The check and the append happen under the same lock as rotation.
    pub fn append(&self, epoch: u64, bytes: &[u8]) -> bool {
        let mut state = self.state.lock();
        if epoch != self.epoch.load(Ordering::Acquire) {
            trace!("Refusing append from stale epoch {}", epoch);
            return false;
        }

        let chunk = state.current();
        chunk.data.extend_from_slice(bytes);
        chunk.events += 1;
        drop(state);

        self.stats.events_appended.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_appended
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        true
    }

    /// Append to whichever chunk is open, for events that carry no
    /// epoch-scoped references
    pub fn append_current(&self, bytes: &[u8]) {
        let mut state = self.state.lock();
        let chunk = state.current();
        chunk.data.extend_from_slice(bytes);
        chunk.events += 1;
        drop(state);

        self.stats.events_appended.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_appended
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
    }

    /// Register a string constant in the chunk for `epoch`.
    ///
    /// Returns `false` if `epoch` is no longer current.
    pub fn add_constant(&self, epoch: u64, id: u64, text: &str) -> bool {
        let mut state = self.state.lock();
        if epoch != self.epoch.load(Ordering::Acquire) {
            return false;
        }
        state.current().constants.push((id, text.to_string()));
        true
    }

    /// Seal the open chunk and start a new epoch. Returns the new epoch.
    pub fn rotate(&self) -> u64 {
        let mut state = self.state.lock();

        let sealed = state.current();
        sealed.sealed = true;
        let (old_epoch, events, bytes) = (sealed.epoch, sealed.events, sealed.data.len());

        let new_epoch = old_epoch + 1;
        state.chunks.push(Chunk {
            epoch: new_epoch,
            ..Default::default()
        });
        self.epoch.store(new_epoch, Ordering::Release);
        drop(state);

        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
        info!(
            "Rotated recording: sealed epoch {} ({} events, {} bytes), now at epoch {}",
            old_epoch, events, bytes, new_epoch
        );
        new_epoch
    }

    /// Copy of the chunk written during `epoch`
    pub fn chunk(&self, epoch: u64) -> Option<Chunk> {
        self.state
            .lock()
            .chunks
            .iter()
            .find(|chunk| chunk.epoch == epoch)
            .cloned()
    }

    /// Copy of every chunk, oldest first
    pub fn chunks(&self) -> Vec<Chunk> {
        self.state.lock().chunks.clone()
    }

    /// Number of constants registered in the open chunk
    pub fn current_chunk_constants(&self) -> usize {
        self.state.lock().current().constants.len()
    }

    /// Total bytes across all chunks
    pub fn total_bytes(&self) -> usize {
        self.state.lock().chunks.iter().map(|c| c.data.len()).sum()
    }

    pub fn stats(&self) -> RecorderStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for Recording {
    fn default() -> Self {
        Self::new()
    }
}

/// Recording counters
#[derive(Debug, Default)]
pub struct RecorderStats {
    pub events_appended: AtomicU64,
    pub bytes_appended: AtomicU64,
    pub rotations: AtomicU64,
    pub staged_drained: AtomicU64,
}

impl RecorderStats {
    fn snapshot(&self) -> RecorderStatsSnapshot {
        RecorderStatsSnapshot {
            events_appended: self.events_appended.load(Ordering::Relaxed),
            bytes_appended: self.bytes_appended.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            staged_drained: self.staged_drained.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RecorderStats`]
#[derive(Debug, Clone, Default)]
pub struct RecorderStatsSnapshot {
    pub events_appended: u64,
    pub bytes_appended: u64,
    pub rotations: u64,
    pub staged_drained: u64,
}

impl RecorderStatsSnapshot {
    pub fn avg_event_size(&self) -> u64 {
        if self.events_appended == 0 {
            0
        } else {
            self.bytes_appended / self.events_appended
        }
    }
}

/// Background thread moving staged events into the recording
pub struct StagedDrainer {
    queue: Arc<EventQueue>,
    recording: Arc<Recording>,
    flush_tx: Sender<()>,
    shutdown_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StagedDrainer {
    /// Start draining `queue` every `interval`
    pub fn start(queue: Arc<EventQueue>, recording: Arc<Recording>, interval: Duration) -> Self {
        info!("Starting staged event drainer ({:?} interval)", interval);

        let (flush_tx, flush_rx) = bounded::<()>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = {
            let queue = Arc::clone(&queue);
            let recording = Arc::clone(&recording);
            std::thread::Builder::new()
                .name("staged-drainer".to_string())
                .spawn(move || loop {
                    select! {
                        recv(ticker) -> _ => {
                            Self::drain(&queue, &recording);
                        }
                        recv(flush_rx) -> _ => {
                            Self::drain(&queue, &recording);
                        }
                        recv(shutdown_rx) -> _ => {
                            Self::drain(&queue, &recording);
                            debug!("Staged event drainer stopped");
                            break;
                        }
                    }
                })
        };

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn staged drainer thread: {}", e);
                None
            }
        };

        Self {
            queue,
            recording,
            flush_tx,
            shutdown_tx,
            handle,
        }
    }

    /// Move everything currently queued into the recording
    pub fn drain(queue: &EventQueue, recording: &Recording) -> usize {
        let start = Instant::now();
        let mut drained = 0;

        while let Some(event) = queue.try_pop() {
            recording.append_current(&event.bytes);
            drained += 1;
        }

        if drained > 0 {
            recording
                .stats
                .staged_drained
                .fetch_add(drained as u64, Ordering::Relaxed);
            trace!("Drained {} staged events in {:?}", drained, start.elapsed());
        }
        drained
    }

    /// Ask the background thread to drain now
    pub fn flush(&self) {
        let _ = self.flush_tx.try_send(());
    }

    /// Drain on the calling thread without waiting for the next tick
    pub fn drain_now(&self) -> usize {
        Self::drain(&self.queue, &self.recording)
    }

    /// Stop the background thread after a final drain
    pub fn shutdown(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Staged drainer thread panicked");
            }
        }
    }
}

impl Drop for StagedDrainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
