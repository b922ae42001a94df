// src/event/writer.rs
//! Event writer
//!
//! One writer per thread, reused for every event that thread records. The
//! writer holds only a cursor (`start ≤ current ≤ max`) into memory leased
//! from its [`BufferBackend`]; it never allocates on the write path and
//! never takes a lock.
//!
//! # Usage
//!
//! ```text
//! loop {
//!     if !writer.begin_event(&config, TYPE_ID) { break; }
//!     writer.put_long(..);
//!     writer.put_string(Some(..));
//!     if writer.end_event().is_done() { break; }
//! }
//! ```
//!
//! Capacity problems never surface as errors. A field that cannot get
//! space invalidates the session and every later `put_*` is a no-op; the
//! event is then dropped by `end_event`. Epoch shifts and size-class
//! mispredictions ask the caller to redo the whole event.

use crate::backend::staged::StagedBuffer;
use crate::backend::thread_buffer::ThreadBuffer;
use crate::backend::BufferBackend;
use crate::encoding::string::StringEncoder;
use crate::encoding::varint::{self, MAX_VARINT_LEN, PADDED_LEN};
use crate::event::configuration::EventConfiguration;
use crate::observability::{BYTES_COMMITTED, EVENTS_COMMITTED, EVENTS_DROPPED, EVENT_RETRIES};
use crate::pool::identity::{ClassRef, IdentityTables};
use crate::pool::string_pool::{StringPool, ThreadKind};
use crate::recording::clock;
use crate::recording::event_queue::EventQueue;
use crate::recording::recorder::Recording;
use crate::utils::config::RecorderConfig;
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{debug, trace};

/// Largest event the 28-bit size header can describe
pub const MAX_EVENT_SIZE: usize = (1 << 28) - 1;

/// Events below this size use the 1-byte size header
const SMALL_SIZE_LIMIT: usize = 128;

// Worst-case varint widths per Java-style integer type
const BYTE_WIDTH: usize = 2;
const SHORT_WIDTH: usize = 3;
const INT_WIDTH: usize = 5;

/// Why an event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The backend could not supply space mid-event
    Invalidated,

    /// The event exceeded the maximum event size
    Oversized,

    /// `end_event` without a matching successful `begin_event`
    NoSession,
}

impl DropReason {
    fn label(&self) -> &'static str {
        match self {
            DropReason::Invalidated => "invalidated",
            DropReason::Oversized => "oversized",
            DropReason::NoSession => "no_session",
        }
    }
}

/// Why the caller has to write the event again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The 1-byte size header was too small; the type now uses 4 bytes
    LargeSizeMispredicted,

    /// The buffer was retired by a rotation while the event was written
    EpochShift,
}

impl RetryReason {
    fn label(&self) -> &'static str {
        match self {
            RetryReason::LargeSizeMispredicted => "large_size",
            RetryReason::EpochShift => "epoch_shift",
        }
    }
}

/// Result of [`EventWriter::end_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// Exactly one copy of the event is now part of the recording
    Committed,

    /// Nothing was committed and nothing should be retried
    Dropped(DropReason),

    /// Nothing was committed; redo begin..end from scratch
    Retry(RetryReason),
}

impl EndOutcome {
    /// Whether the caller is finished with this event
    pub fn is_done(&self) -> bool {
        !matches!(self, EndOutcome::Retry(_))
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, EndOutcome::Committed)
    }
}

/// Per-writer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub committed: u64,
    pub bytes_committed: u64,
    pub dropped_invalidated: u64,
    pub dropped_oversized: u64,
    pub retries_large_size: u64,
    pub retries_epoch_shift: u64,
}

/// Encodes events into a backend-supplied region
pub struct EventWriter<B: BufferBackend> {
    backend: B,
    strings: StringEncoder,
    identities: Arc<dyn IdentityTables>,
    start_position: usize,
    current_position: usize,
    max_position: usize,
    valid: bool,
    excluded: bool,
    large_size: bool,
    event_type: Option<Arc<EventConfiguration>>,
    thread_id: u64,
    thread_kind: ThreadKind,
    max_event_size: usize,
    stats: WriterStats,
}

impl EventWriter<ThreadBuffer> {
    /// Writer for the calling thread, publishing directly into `recording`
    pub fn direct(
        recording: Arc<Recording>,
        pool: Arc<dyn StringPool>,
        identities: Arc<dyn IdentityTables>,
        config: &RecorderConfig,
    ) -> Self {
        let backend = ThreadBuffer::new(recording, &config.thread_buffer);
        let strings = StringEncoder::with_pool(pool, &config.string_pool);
        Self::new(backend, strings, identities).with_max_event_size(config.writer.max_event_size)
    }
}

impl EventWriter<StagedBuffer> {
    /// Writer for the calling thread, staging events into `queue`
    pub fn staged(
        queue: Arc<EventQueue>,
        identities: Arc<dyn IdentityTables>,
        config: &RecorderConfig,
    ) -> Self {
        let thread_id = identities.thread_id(std::thread::current().id());
        let backend = StagedBuffer::new(queue, &config.staged, thread_id);
        Self::new(backend, StringEncoder::inline_only(), identities)
            .with_max_event_size(config.writer.max_event_size)
    }
}

impl<B: BufferBackend> EventWriter<B> {
    /// Create a writer for the calling thread over `backend`
    pub fn new(mut backend: B, strings: StringEncoder, identities: Arc<dyn IdentityTables>) -> Self {
        let capabilities = backend.capabilities();
        let strings = if capabilities.constant_pool {
            strings
        } else {
            strings.without_pool()
        };
        let thread_id = identities.thread_id(std::thread::current().id());

        let mut writer = Self {
            backend,
            strings,
            identities,
            start_position: 0,
            current_position: 0,
            max_position: 0,
            valid: true,
            excluded: false,
            large_size: false,
            event_type: None,
            thread_id,
            thread_kind: ThreadKind::Platform,
            max_event_size: MAX_EVENT_SIZE,
            stats: WriterStats::default(),
        };
        writer.reload_lease();

        debug!(
            "Event writer created for thread {} (direct_memory={}, constant_pool={})",
            thread_id, capabilities.direct_memory, capabilities.constant_pool
        );
        writer
    }

    /// Lower the size above which events are dropped
    pub fn with_max_event_size(mut self, max_event_size: usize) -> Self {
        self.max_event_size = max_event_size.min(MAX_EVENT_SIZE);
        self
    }

    /// Kind of thread strings are pooled under
    pub fn with_thread_kind(mut self, kind: ThreadKind) -> Self {
        self.thread_kind = kind;
        self
    }

    /// Start an event of `configuration`'s type.
    ///
    /// `call_site_type_id` is the id the instrumentation was built with.
    /// Returns `false` if this thread is excluded from recording.
    ///
    /// # Panics
    ///
    /// If `call_site_type_id` differs from the configuration's id. That only
    /// happens when instrumentation and registry disagree, which cannot be
    /// recovered from.
    pub fn begin_event(&mut self, configuration: &Arc<EventConfiguration>, call_site_type_id: u64) -> bool {
        if configuration.id() != call_site_type_id {
            panic!(
                "Unexpected event type id {} for configuration {} ({})",
                call_site_type_id,
                configuration.id(),
                configuration.name()
            );
        }
        if self.excluded {
            return false;
        }

        self.event_type = Some(Arc::clone(configuration));
        self.large_size = configuration.is_large_size();
        self.reserve_event_size_field();
        self.put_varint(configuration.id(), MAX_VARINT_LEN);
        true
    }

    /// Finish the current event
    pub fn end_event(&mut self) -> EndOutcome {
        let event_type = self.event_type.take();

        if !self.valid {
            self.reset();
            self.valid = true;
            return self.dropped(DropReason::Invalidated);
        }
        let Some(event_type) = event_type else {
            self.reset();
            return self.dropped(DropReason::NoSession);
        };

        let event_size = self.current_position - self.start_position;
        if event_size > self.max_event_size {
            debug!(
                "Dropping {} byte event of type {}, limit is {}",
                event_size,
                event_type.id(),
                self.max_event_size
            );
            self.reset();
            return self.dropped(DropReason::Oversized);
        }

        let start = self.start_position;
        if self.large_size {
            let header = varint::encode_padded(event_size as u32);
            self.backend.region_mut()[start..start + PADDED_LEN].copy_from_slice(&header);
        } else if event_size < SMALL_SIZE_LIMIT {
            self.backend.region_mut()[start] = event_size as u8;
        } else {
            event_type.set_large_size();
            self.reset();
            return self.retry(RetryReason::LargeSizeMispredicted);
        }

        let end = self.current_position;
        let next = self.backend.commit(end);
        if next == end {
            self.start_position = next;
        } else if next == 0 {
            self.reload_lease();
        } else {
            trace!("Commit of {} bytes hit an epoch shift, resuming at {}", event_size, next);
            self.start_position = next;
            self.current_position = next;
            // A retired lease may have shrunk the region
            self.max_position = self.max_position.min(self.backend.region_mut().len());
            return self.retry(RetryReason::EpochShift);
        }

        self.stats.committed += 1;
        self.stats.bytes_committed += event_size as u64;
        metrics::counter!(EVENTS_COMMITTED).increment(1);
        metrics::counter!(BYTES_COMMITTED).increment(event_size as u64);
        EndOutcome::Committed
    }

    pub fn put_boolean(&mut self, value: bool) {
        if self.is_valid_for_size(1) {
            let pos = self.current_position;
            self.backend.region_mut()[pos] = u8::from(value);
            self.current_position += 1;
        }
    }

    pub fn put_byte(&mut self, value: i8) {
        self.put_varint(u64::from(value as u8), BYTE_WIDTH);
    }

    /// One UTF-16 code unit
    pub fn put_char(&mut self, value: u16) {
        self.put_varint(u64::from(value), SHORT_WIDTH);
    }

    pub fn put_short(&mut self, value: i16) {
        self.put_varint(u64::from(value as u16), SHORT_WIDTH);
    }

    pub fn put_int(&mut self, value: i32) {
        self.put_varint(u64::from(value as u32), INT_WIDTH);
    }

    pub fn put_long(&mut self, value: i64) {
        self.put_varint(value as u64, MAX_VARINT_LEN);
    }

    pub fn put_float(&mut self, value: f32) {
        self.put_fixed(&value.to_be_bytes());
    }

    pub fn put_double(&mut self, value: f64) {
        self.put_fixed(&value.to_be_bytes());
    }

    pub fn put_string(&mut self, value: Option<&str>) {
        let encoding = self.strings.classify(value, self.thread_kind);
        if self.is_valid_for_size(encoding.max_encoded_len()) {
            let pos = self.current_position;
            let written = encoding.write(value, &mut self.backend.region_mut()[pos..]);
            self.current_position += written;
        }
    }

    /// Identity of the writing thread
    pub fn put_event_thread(&mut self) {
        self.put_varint(self.thread_id, MAX_VARINT_LEN);
    }

    pub fn put_thread(&mut self, thread: Option<ThreadId>) {
        let id = thread.map_or(0, |thread| self.identities.thread_id(thread));
        self.put_varint(id, MAX_VARINT_LEN);
    }

    pub fn put_class(&mut self, class: Option<ClassRef>) {
        let id = class.map_or(0, |class| self.identities.class_id(class));
        self.put_varint(id, MAX_VARINT_LEN);
    }

    /// Stack trace id from the stack-trace repository, 0 for none
    pub fn put_stack_trace(&mut self, stack_trace_id: u64) {
        self.put_varint(stack_trace_id, MAX_VARINT_LEN);
    }

    /// Current recording clock value
    pub fn put_ticks(&mut self) {
        self.put_varint(clock::ticks(), MAX_VARINT_LEN);
    }

    /// Opt this thread out of recording (or back in)
    pub fn set_excluded(&mut self, excluded: bool) {
        self.excluded = excluded;
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn start_position(&self) -> usize {
        self.start_position
    }

    pub fn current_position(&self) -> usize {
        self.current_position
    }

    pub fn max_position(&self) -> usize {
        self.max_position
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn reserve_event_size_field(&mut self) {
        let width = if self.large_size { PADDED_LEN } else { 1 };
        if self.is_valid_for_size(width) {
            self.current_position += width;
        }
    }

    fn put_varint(&mut self, value: u64, worst_case: usize) {
        if self.is_valid_for_size(worst_case) {
            let pos = self.current_position;
            let written = varint::encode(value, &mut self.backend.region_mut()[pos..]);
            self.current_position += written;
        }
    }

    fn put_fixed(&mut self, bytes: &[u8]) {
        if self.is_valid_for_size(bytes.len()) {
            let pos = self.current_position;
            self.backend.region_mut()[pos..pos + bytes.len()].copy_from_slice(bytes);
            self.current_position += bytes.len();
        }
    }

    fn used_size(&self) -> usize {
        self.current_position - self.start_position
    }

    fn is_valid_for_size(&mut self, requested: usize) -> bool {
        if !self.valid {
            return false;
        }
        let fits = self
            .current_position
            .checked_add(requested)
            .is_some_and(|end| end <= self.max_position);
        if !fits {
            self.flush(self.used_size(), requested);
        }
        self.valid
    }

    fn flush(&mut self, used: usize, requested: usize) {
        match self.backend.flush(used, requested) {
            Some(lease) => {
                self.start_position = lease.start;
                self.current_position = lease.start + used;
                self.max_position = lease.max;
                if lease.capacity() < used + requested {
                    self.valid = false;
                }
            }
            None => self.valid = false,
        }
        if !self.valid {
            trace!("Session invalidated: no room for {} more bytes after {}", requested, used);
        }
    }

    fn reload_lease(&mut self) {
        match self.backend.acquire() {
            Some(lease) => {
                self.start_position = lease.start;
                self.current_position = lease.start;
                self.max_position = lease.max;
            }
            None => {
                // Zero capacity, the next write asks the backend again
                self.start_position = 0;
                self.current_position = 0;
                self.max_position = 0;
            }
        }
    }

    fn reset(&mut self) {
        self.current_position = self.start_position;
    }

    fn dropped(&mut self, reason: DropReason) -> EndOutcome {
        match reason {
            DropReason::Invalidated => self.stats.dropped_invalidated += 1,
            DropReason::Oversized => self.stats.dropped_oversized += 1,
            DropReason::NoSession => {}
        }
        metrics::counter!(EVENTS_DROPPED, "reason" => reason.label()).increment(1);
        EndOutcome::Dropped(reason)
    }

    fn retry(&mut self, reason: RetryReason) -> EndOutcome {
        match reason {
            RetryReason::LargeSizeMispredicted => self.stats.retries_large_size += 1,
            RetryReason::EpochShift => self.stats.retries_epoch_shift += 1,
        }
        metrics::counter!(EVENT_RETRIES, "reason" => reason.label()).increment(1);
        EndOutcome::Retry(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::thread_buffer::HEADER_SIZE;
    use crate::backend::{BackendCapabilities, Lease};
    use crate::encoding::string::StringTag;
    use crate::event::configuration::ConfigurationRegistry;
    use crate::pool::identity::InternedIdentities;
    use crate::pool::string_pool::InMemoryStringPool;
    use crate::recording::recorder::FIRST_EPOCH;
    use std::collections::VecDeque;

    /// Backend with scripted flush and commit answers
    struct ScriptedBackend {
        region: Vec<u8>,
        start: usize,
        flush_answer: Option<Lease>,
        commit_answers: VecDeque<usize>,
        committed: Vec<Vec<u8>>,
        acquires: usize,
    }

    impl ScriptedBackend {
        fn new(size: usize) -> Self {
            Self {
                region: vec![0; size],
                start: 16,
                flush_answer: None,
                commit_answers: VecDeque::new(),
                committed: Vec::new(),
                acquires: 0,
            }
        }
    }

    impl BufferBackend for ScriptedBackend {
        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                direct_memory: true,
                constant_pool: false,
            }
        }

        fn acquire(&mut self) -> Option<Lease> {
            self.acquires += 1;
            self.start = 16;
            Some(Lease {
                start: 16,
                max: self.region.len(),
            })
        }

        fn region_mut(&mut self) -> &mut [u8] {
            &mut self.region
        }

        fn flush(&mut self, _used: usize, _requested: usize) -> Option<Lease> {
            self.flush_answer
        }

        fn commit(&mut self, end: usize) -> usize {
            let answer = self.commit_answers.pop_front().unwrap_or(end);
            if answer == end {
                self.committed.push(self.region[self.start..end].to_vec());
                self.start = end;
            }
            answer
        }
    }

    fn registry_with(name: &str) -> (ConfigurationRegistry, Arc<EventConfiguration>) {
        let registry = ConfigurationRegistry::new();
        let config = registry.register(name).unwrap();
        (registry, config)
    }

    fn direct_writer(recording: &Arc<Recording>) -> EventWriter<ThreadBuffer> {
        let config = RecorderConfig::default();
        let pool = Arc::new(InMemoryStringPool::new(Arc::clone(recording), 64));
        EventWriter::direct(
            Arc::clone(recording),
            pool,
            Arc::new(InternedIdentities::new()),
            &config,
        )
    }

    fn scripted_writer(backend: ScriptedBackend) -> EventWriter<ScriptedBackend> {
        EventWriter::new(
            backend,
            StringEncoder::inline_only(),
            Arc::new(InternedIdentities::new()),
        )
    }

    #[test]
    fn test_wire_layout() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("layout");
        let mut writer = direct_writer(&recording);

        assert!(writer.begin_event(&config, config.id()));
        writer.put_boolean(true);
        writer.put_int(300);
        writer.put_string(None);
        assert_eq!(writer.end_event(), EndOutcome::Committed);

        let id = config.id() as u8;
        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(data, vec![6, id, 1, 0xAC, 0x02, StringTag::Null as u8]);
    }

    #[test]
    fn test_integers_are_zero_extended() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("ints");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_byte(-1);
        writer.put_short(-1);
        writer.put_int(-1);
        writer.put_char(0xFFFF);
        assert!(writer.end_event().is_committed());

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        let mut pos = 2;
        for expected in [0xFFu64, 0xFFFF, 0xFFFF_FFFF, 0xFFFF] {
            let (value, n) = varint::decode(&data[pos..]).unwrap();
            assert_eq!(value, expected);
            pos += n;
        }
        assert_eq!(pos, data.len());
        assert_eq!(data[0] as usize, data.len());
    }

    #[test]
    fn test_long_uses_nine_bytes_at_most() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("longs");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_long(-1);
        writer.end_event();

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(data.len(), 2 + 9);
        assert_eq!(varint::decode(&data[2..]).unwrap(), (u64::MAX, 9));
    }

    #[test]
    fn test_floats_are_big_endian() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("floats");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_float(1.5);
        writer.put_double(-2.25);
        writer.end_event();

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(&data[2..6], &1.5f32.to_be_bytes());
        assert_eq!(&data[6..14], &(-2.25f64).to_be_bytes());
    }

    #[test]
    #[should_panic(expected = "Unexpected event type id")]
    fn test_type_id_mismatch_is_fatal() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("mismatch");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id() + 1);
    }

    #[test]
    fn test_excluded_thread_reserves_nothing() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("excluded");
        let mut writer = direct_writer(&recording);
        writer.set_excluded(true);

        let before = writer.current_position();
        assert!(!writer.begin_event(&config, config.id()));
        assert_eq!(writer.current_position(), before);
        assert_eq!(writer.end_event(), EndOutcome::Dropped(DropReason::NoSession));
        assert_eq!(recording.total_bytes(), 0);
    }

    #[test]
    fn test_invalidated_session_commits_nothing() {
        let (_registry, config) = registry_with("invalidated");
        let mut writer = scripted_writer(ScriptedBackend::new(32));
        let start = writer.start_position();

        writer.begin_event(&config, config.id());
        writer.put_string(Some(&"q".repeat(40)));
        assert!(!writer.is_valid());

        // Later fields are silently ignored
        writer.put_long(5);
        writer.put_boolean(true);

        assert_eq!(writer.end_event(), EndOutcome::Dropped(DropReason::Invalidated));
        assert!(writer.is_valid());
        assert_eq!(writer.current_position(), start);
        assert!(writer.backend().committed.is_empty());
        assert_eq!(writer.stats().dropped_invalidated, 1);
    }

    #[test]
    fn test_oversized_event_is_dropped() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("oversized");
        let mut writer = direct_writer(&recording).with_max_event_size(16);
        let start = writer.start_position();

        writer.begin_event(&config, config.id());
        for _ in 0..4 {
            writer.put_double(0.0);
        }
        assert_eq!(writer.end_event(), EndOutcome::Dropped(DropReason::Oversized));
        assert_eq!(writer.current_position(), start);
        assert_eq!(recording.total_bytes(), 0);
        assert_eq!(writer.stats().dropped_oversized, 1);
    }

    #[test]
    fn test_large_size_misprediction_retries_once() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("large");
        let mut writer = direct_writer(&recording);
        let payload = "p".repeat(200);

        let mut outcomes = Vec::new();
        loop {
            writer.begin_event(&config, config.id());
            writer.put_string(Some(&payload));
            let outcome = writer.end_event();
            outcomes.push(outcome);
            if outcome.is_done() {
                break;
            }
        }

        assert_eq!(
            outcomes,
            vec![
                EndOutcome::Retry(RetryReason::LargeSizeMispredicted),
                EndOutcome::Committed
            ]
        );
        assert!(config.is_large_size());

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        let size = varint::decode_padded(&data).unwrap() as usize;
        assert_eq!(size, data.len());
        assert_eq!(recording.chunk(FIRST_EPOCH).unwrap().events, 1);
    }

    #[test]
    fn test_large_size_header_for_small_event() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("sticky");
        config.set_large_size();
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_boolean(false);
        assert!(writer.end_event().is_committed());

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(data.len(), PADDED_LEN + 1 + 1);
        assert_eq!(varint::decode_padded(&data).unwrap() as usize, data.len());
    }

    #[test]
    fn test_epoch_shift_retry_yields_one_copy() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("shift");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_long(42);
        recording.rotate();
        assert_eq!(writer.end_event(), EndOutcome::Retry(RetryReason::EpochShift));
        assert_eq!(writer.current_position(), HEADER_SIZE);

        writer.begin_event(&config, config.id());
        writer.put_long(42);
        assert_eq!(writer.end_event(), EndOutcome::Committed);

        assert!(recording.chunk(FIRST_EPOCH).unwrap().data.is_empty());
        let chunk = recording.chunk(recording.epoch()).unwrap();
        assert_eq!(chunk.events, 1);
        assert_eq!(chunk.data, vec![3, config.id() as u8, 42]);
        assert_eq!(writer.stats().retries_epoch_shift, 1);
    }

    #[test]
    fn test_foreign_commit_offset_resets_cursor() {
        let (_registry, config) = registry_with("scripted");
        let mut backend = ScriptedBackend::new(64);
        backend.commit_answers.push_back(40);
        let mut writer = scripted_writer(backend);

        writer.begin_event(&config, config.id());
        writer.put_int(1);
        assert_eq!(writer.end_event(), EndOutcome::Retry(RetryReason::EpochShift));
        assert_eq!(writer.start_position(), 40);
        assert_eq!(writer.current_position(), 40);
    }

    #[test]
    fn test_zero_commit_reacquires_lease() {
        let (_registry, config) = registry_with("finalized");
        let mut backend = ScriptedBackend::new(64);
        backend.commit_answers.push_back(0);
        let mut writer = scripted_writer(backend);
        assert_eq!(writer.backend().acquires, 1);

        writer.begin_event(&config, config.id());
        writer.put_int(1);
        assert_eq!(writer.end_event(), EndOutcome::Committed);
        assert_eq!(writer.backend().acquires, 2);
        assert_eq!(writer.current_position(), 16);
    }

    #[test]
    fn test_flush_relocates_partial_event() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("relocate");
        let mut rc = RecorderConfig::default();
        rc.thread_buffer.size = 32;
        let mut writer = EventWriter::direct(
            Arc::clone(&recording),
            Arc::new(InMemoryStringPool::new(Arc::clone(&recording), 8)),
            Arc::new(InternedIdentities::new()),
            &rc,
        );

        for i in 0..10 {
            writer.begin_event(&config, config.id());
            writer.put_long(i);
            writer.put_double(i as f64);
            assert!(writer.end_event().is_committed());
        }

        let chunk = recording.chunk(FIRST_EPOCH).unwrap();
        assert_eq!(chunk.events, 10);
        // size + id + long + double
        assert_eq!(chunk.data.len(), 10 * (1 + 1 + 1 + 8));
        for (i, event) in chunk.data.chunks(11).enumerate() {
            assert_eq!(event[0], 11);
            assert_eq!(event[2], i as u8);
        }
    }

    #[test]
    fn test_pooled_strings_in_direct_writer() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("pooled");
        let mut writer = direct_writer(&recording);
        let name = "com.example.OrderService";

        for _ in 0..2 {
            writer.begin_event(&config, config.id());
            writer.put_string(Some(name));
            assert!(writer.end_event().is_committed());
        }

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(data.len(), 8);
        assert_eq!(&data[..4], &data[4..]);
        assert_eq!(data[2], StringTag::ConstantPool as u8);
        assert_eq!(recording.current_chunk_constants(), 1);
    }

    #[test]
    fn test_staged_writer_inlines_strings() {
        let queue = Arc::new(EventQueue::new(8));
        let (_registry, config) = registry_with("staged");
        let mut writer = EventWriter::staged(
            Arc::clone(&queue),
            Arc::new(InternedIdentities::new()),
            &RecorderConfig::default(),
        );

        writer.begin_event(&config, config.id());
        writer.put_string(Some("com.example.OrderService"));
        assert!(writer.end_event().is_committed());
        assert_eq!(writer.current_position(), 0);

        let staged = queue.try_pop().unwrap();
        assert_eq!(staged.thread_id, writer.thread_id());
        assert_eq!(staged.bytes[2], StringTag::CharArray as u8);
        assert_eq!(staged.bytes[0] as usize, staged.bytes.len());
    }

    #[test]
    fn test_thread_and_class_references() {
        let recording = Arc::new(Recording::new());
        let (_registry, config) = registry_with("refs");
        let mut writer = direct_writer(&recording);

        writer.begin_event(&config, config.id());
        writer.put_event_thread();
        writer.put_thread(None);
        writer.put_class(None);
        writer.put_class(Some(ClassRef::of::<String>()));
        writer.put_stack_trace(0);
        assert!(writer.end_event().is_committed());

        let data = recording.chunk(FIRST_EPOCH).unwrap().data;
        assert_eq!(data[2] as u64, writer.thread_id());
        assert_eq!(data[3], 0);
        assert_eq!(data[4], 0);
        assert_ne!(data[5], 0);
        assert_eq!(data[6], 0);
    }
}
