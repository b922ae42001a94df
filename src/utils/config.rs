// src/utils/config.rs
//! Recorder configuration
//!
//! Loaded from an optional `recorder.{toml,yaml,json}` file in the working
//! directory, overridden by `SENTRA_RECORDER_*` environment variables
//! (nested keys separated by `__`, e.g. `SENTRA_RECORDER_THREAD_BUFFER__SIZE`).

use crate::backend::thread_buffer::HEADER_SIZE;
use crate::event::writer::MAX_EVENT_SIZE;
use crate::utils::errors::{RecorderError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "SENTRA_RECORDER";

/// Top-level recorder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub writer: WriterSettings,
    pub thread_buffer: ThreadBufferSettings,
    pub string_pool: StringPoolSettings,
    pub staged: StagedSettings,
}

/// Event writer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Events larger than this are dropped at commit time
    pub max_event_size: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            max_event_size: MAX_EVENT_SIZE,
        }
    }
}

/// Direct in-process buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadBufferSettings {
    /// Size of each per-thread buffer in bytes, header included
    pub size: usize,

    /// Largest one-off lease handed out for an event that does not fit
    pub max_lease_size: usize,
}

impl Default for ThreadBufferSettings {
    fn default() -> Self {
        Self {
            size: 8 * 1024,
            max_lease_size: 1024 * 1024,
        }
    }
}

/// String constant pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StringPoolSettings {
    /// Strings must be strictly longer than this to be pooled
    pub min_limit: usize,

    /// Strings must be strictly shorter than this to be pooled
    pub max_limit: usize,

    /// Distinct strings kept per epoch before the pool stops accepting
    pub max_entries: usize,
}

impl Default for StringPoolSettings {
    fn default() -> Self {
        Self {
            min_limit: 16,
            max_limit: 128,
            max_entries: 10_000,
        }
    }
}

/// Staged (asynchronous hand-off) backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagedSettings {
    /// Capacity of the hand-off queue in events
    pub queue_capacity: usize,

    /// Largest event the staging array may grow to
    pub max_event_bytes: usize,

    /// Drainer poll interval
    pub drain_interval_ms: u64,
}

impl Default for StagedSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 65_536,
            max_event_bytes: 64 * 1024,
            drain_interval_ms: 10,
        }
    }
}

impl RecorderConfig {
    /// Load from `recorder.*` (optional) and the environment
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("recorder").required(false))
            .add_source(Self::environment())
            .build()?;

        Self::finish(settings)
    }

    /// Load from an explicit file, still honouring environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;

        Self::finish(settings)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(settings: Config) -> Result<Self> {
        let config: RecorderConfig = settings.try_deserialize()?;
        config.validate()?;
        debug!("Recorder configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.writer.max_event_size == 0 {
            return Err(RecorderError::InvalidConfig(
                "writer.max_event_size cannot be 0".to_string(),
            ));
        }
        if self.writer.max_event_size > MAX_EVENT_SIZE {
            return Err(RecorderError::InvalidConfig(format!(
                "writer.max_event_size cannot exceed {}",
                MAX_EVENT_SIZE
            )));
        }

        // Room for the header plus the largest size field and a type id
        if self.thread_buffer.size < HEADER_SIZE + 16 {
            return Err(RecorderError::InvalidConfig(format!(
                "thread_buffer.size must be at least {} bytes",
                HEADER_SIZE + 16
            )));
        }
        if self.thread_buffer.max_lease_size < self.thread_buffer.size {
            return Err(RecorderError::InvalidConfig(
                "thread_buffer.max_lease_size cannot be smaller than thread_buffer.size"
                    .to_string(),
            ));
        }

        if self.string_pool.min_limit >= self.string_pool.max_limit {
            return Err(RecorderError::InvalidConfig(
                "string_pool.min_limit must be below string_pool.max_limit".to_string(),
            ));
        }

        if self.staged.queue_capacity == 0 {
            return Err(RecorderError::InvalidConfig(
                "staged.queue_capacity cannot be 0".to_string(),
            ));
        }
        if self.staged.max_event_bytes < 16 {
            return Err(RecorderError::InvalidConfig(
                "staged.max_event_bytes must be at least 16".to_string(),
            ));
        }

        Ok(())
    }
}
