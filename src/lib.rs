// src/lib.rs
//! Sentra Lab flight recorder
//!
//! In-process event writer for the simulation engine's telemetry stream.
//! Instrumented code encodes strongly typed events into a compact binary
//! form and commits them into a shared, rotating recording with
//! at-most-one-copy semantics, even when the buffer it was writing into is
//! retired by a concurrent rotation.
//!
//! # Architecture
//!
//! - **encoding**: varint codec and string / constant-pool encoding
//! - **event**: per-type configuration and the event writer
//! - **backend**: buffer / commit backends the writer leases memory from
//! - **recording**: the shared chunked stream, its epoch and the staged queue
//! - **pool**: string constant pool and thread / class identity tables
//! - **observability**: tracing setup and metric names
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use sentra_lab_recorder::{
//!     ConfigurationRegistry, EventWriter, InMemoryStringPool, InternedIdentities,
//!     RecorderConfig, Recording,
//! };
//! use std::sync::Arc;
//!
//! let config = RecorderConfig::default();
//! let recording = Arc::new(Recording::new());
//! let pool = Arc::new(InMemoryStringPool::new(
//!     Arc::clone(&recording),
//!     config.string_pool.max_entries,
//! ));
//! let registry = ConfigurationRegistry::new();
//! let request = registry.register("http.request").unwrap();
//!
//! let mut writer = EventWriter::direct(
//!     Arc::clone(&recording),
//!     pool,
//!     Arc::new(InternedIdentities::new()),
//!     &config,
//! );
//!
//! loop {
//!     if !writer.begin_event(&request, request.id()) {
//!         break;
//!     }
//!     writer.put_ticks();
//!     writer.put_event_thread();
//!     writer.put_string(Some("GET /api/agents"));
//!     writer.put_int(200);
//!     if writer.end_event().is_done() {
//!         break;
//!     }
//! }
//! ```

pub mod backend;
pub mod encoding;
pub mod event;
pub mod observability;
pub mod pool;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use backend::{BufferBackend, Lease, StagedBuffer, ThreadBuffer};
pub use encoding::{StringEncoder, StringEncoding, StringTag};
pub use event::{
    ConfigurationRegistry, DropReason, EndOutcome, EventConfiguration, EventWriter, RetryReason,
    WriterStats, MAX_EVENT_SIZE,
};
pub use pool::{ClassRef, IdentityTables, InMemoryStringPool, InternedIdentities, StringPool, ThreadKind};
pub use recording::{EventQueue, Recording, StagedDrainer};
pub use utils::config::RecorderConfig;
pub use utils::errors::{RecorderError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
