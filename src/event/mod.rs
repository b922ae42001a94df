// src/event/mod.rs
//! Event types and the event writer
//!
//! - **Configuration**: per-type identity, enablement, threshold and the
//!   sticky large-size flag, shared through the registry
//! - **Writer**: begin / put* / end over a buffer backend
//!
//! # Session lifecycle
//!
//! ```text
//! IDLE ──begin_event──▶ BEGUN ──put_*──▶ WRITING ──end_event──┬─▶ Committed
//!                                                             ├─▶ Dropped
//!                                                             └─▶ Retry
//! ```

pub mod configuration;
pub mod writer;

pub use configuration::{ConfigurationRegistry, EventConfiguration};
pub use writer::{DropReason, EndOutcome, EventWriter, RetryReason, WriterStats, MAX_EVENT_SIZE};
