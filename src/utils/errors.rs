// src/utils/errors.rs
//! Error types for the recorder
//!
//! The event write path never returns these: capacity exhaustion, oversized
//! events and epoch shifts are reported through `EndOutcome`. Errors are
//! reserved for configuration, registry lookups and the read-back codec.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Recorder errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Configuration could not be loaded or deserialized
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Configuration loaded but failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input ended in the middle of a varint
    #[error("truncated varint: needed at least {needed} more byte(s)")]
    VarintTruncated { needed: usize },

    /// Value does not fit in the 28 bits a padded varint can carry
    #[error("value {0} does not fit in a padded varint")]
    PaddedVarintOverflow(u64),

    /// No configuration registered under this event type id
    #[error("unknown event type id {0}")]
    UnknownEventType(u64),

    /// An event type with this name is already registered
    #[error("event type already registered: {0}")]
    DuplicateEventType(String),

    /// Global tracing subscriber could not be installed
    #[error("observability setup failed: {0}")]
    ObservabilityError(String),
}

impl From<config::ConfigError> for RecorderError {
    fn from(err: config::ConfigError) -> Self {
        RecorderError::ConfigError(err.to_string())
    }
}
