// src/event/configuration.rs
//! Per-event-type configuration
//!
//! Instrumented call sites look a configuration up once, check
//! [`EventConfiguration::should_commit`] themselves, and pass it to
//! `EventWriter::begin_event` together with the type id they were built
//! with.

use crate::utils::errors::{RecorderError, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ids below this are reserved for recorder-internal types
pub const FIRST_USER_TYPE_ID: u64 = 100;

/// Shared configuration for one event type
#[derive(Debug)]
pub struct EventConfiguration {
    id: u64,
    name: String,
    enabled: AtomicBool,
    threshold_ns: AtomicU64,
    large_size: AtomicBool,
}

impl EventConfiguration {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: AtomicBool::new(true),
            threshold_ns: AtomicU64::new(0),
            large_size: AtomicBool::new(false),
        }
    }

    /// Stable numeric id of this type
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_nanos(self.threshold_ns.load(Ordering::Relaxed))
    }

    pub fn set_threshold(&self, threshold: Duration) {
        let nanos = u64::try_from(threshold.as_nanos()).unwrap_or(u64::MAX);
        self.threshold_ns.store(nanos, Ordering::Relaxed);
    }

    /// Whether an event of this type lasting `duration` should be written
    pub fn should_commit(&self, duration: Duration) -> bool {
        self.is_enabled() && duration >= self.threshold()
    }

    /// Whether this type's size header uses the 4-byte padded form
    pub fn is_large_size(&self) -> bool {
        self.large_size.load(Ordering::Acquire)
    }

    /// Switch this type to the 4-byte size header for good
    pub fn set_large_size(&self) {
        if !self.large_size.swap(true, Ordering::AcqRel) {
            debug!("Event type {} ({}) promoted to large size class", self.id, self.name);
        }
    }
}

/// Registry of event configurations keyed by type id
pub struct ConfigurationRegistry {
    by_id: DashMap<u64, Arc<EventConfiguration>>,
    by_name: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU64::new(FIRST_USER_TYPE_ID),
        }
    }

    /// Register a new event type under a fresh id
    pub fn register(&self, name: &str) -> Result<Arc<EventConfiguration>> {
        let id = match self.by_name.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(RecorderError::DuplicateEventType(name.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let configuration = Arc::new(EventConfiguration::new(id, name));
        self.by_id.insert(id, Arc::clone(&configuration));

        info!("Registered event type {} with id {}", name, id);
        Ok(configuration)
    }

    /// Look up the configuration for a type id
    pub fn get(&self, id: u64) -> Result<Arc<EventConfiguration>> {
        self.by_id
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RecorderError::UnknownEventType(id))
    }

    /// Look up the configuration registered under `name`
    pub fn get_by_name(&self, name: &str) -> Option<Arc<EventConfiguration>> {
        let id = *self.by_name.get(name)?;
        self.get(id).ok()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for ConfigurationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
