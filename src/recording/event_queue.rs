// src/recording/event_queue.rs
//! Lock-free MPMC hand-off queue for staged events
//!
//! Staged writers push finished event bytes here without touching the
//! recording; the drainer pops them and appends them in the background.
//! A full queue drops the event rather than blocking the writer.

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A finished event waiting to be appended to the recording
#[derive(Debug, Clone)]
pub struct StagedEvent {
    /// Identity of the writing thread
    pub thread_id: u64,

    /// Encoded event, size header included
    pub bytes: Bytes,
}

impl StagedEvent {
    pub fn new(thread_id: u64, bytes: Bytes) -> Self {
        Self { thread_id, bytes }
    }
}

/// Lock-free event queue
pub struct EventQueue {
    /// Underlying bounded queue
    queue: Arc<ArrayQueue<StagedEvent>>,
    
    /// Push counter
    push_count: Arc<AtomicU64>,
    
    /// Pop counter
    pop_count: Arc<AtomicU64>,
    
    /// Drop counter (queue full)
    drop_count: Arc<AtomicU64>,
}

impl EventQueue {
    /// Create a new event queue
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            push_count: Arc::new(AtomicU64::new(0)),
            pop_count: Arc::new(AtomicU64::new(0)),
            drop_count: Arc::new(AtomicU64::new(0)),
        }
    }
    
    /// Push an event (non-blocking, lock-free)
    pub fn push(&self, event: StagedEvent) -> Result<(), StagedEvent> {
        match self.queue.push(event) {
            Ok(_) => {
                self.push_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(event) => {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
                Err(event)
            }
        }
    }
    
    /// Try to pop an event (non-blocking)
    pub fn try_pop(&self) -> Option<StagedEvent> {
        let event = self.queue.pop()?;
        self.pop_count.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }
    
    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }
    
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
    
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
    
    pub fn len(&self) -> usize {
        self.queue.len()
    }
    
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Queue statistics
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Events accepted
    pub push_count: u64,
    
    /// Events handed to the drainer
    pub pop_count: u64,
    
    /// Events dropped because the queue was full
    pub drop_count: u64,
    
    pub current_size: usize,
    pub capacity: usize,
}

impl QueueStats {
    /// Fill level in percent
    pub fn fill_percentage(&self) -> f64 {
        (self.current_size as f64 / self.capacity as f64) * 100.0
    }
    
    /// Dropped events as a percentage of all attempted pushes
    pub fn drop_rate(&self) -> f64 {
        let attempts = self.push_count + self.drop_count;
        if attempts == 0 {
            0.0
        } else {
            (self.drop_count as f64 / attempts as f64) * 100.0
        }
    }
}
