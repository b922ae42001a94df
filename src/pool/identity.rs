// src/pool/identity.rs
//! Thread and class identity tables
//!
//! References to threads and classes are written as numeric ids; the tables
//! that resolve those ids live outside the event stream. Id 0 is reserved
//! for null.

use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;

/// Reference to a class (a Rust type) written into an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl ClassRef {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Resolves threads and classes to stable non-zero ids
pub trait IdentityTables: Send + Sync {
    fn thread_id(&self, thread: ThreadId) -> u64;
    fn class_id(&self, class: ClassRef) -> u64;
}

/// Assigns ids on first sight and keeps them for the process lifetime
#[derive(Default)]
pub struct InternedIdentities {
    threads: DashMap<ThreadId, u64>,
    classes: DashMap<TypeId, (u64, &'static str)>,
    next_id: AtomicU64,
}

impl InternedIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Name a class id was assigned to
    pub fn class_name(&self, id: u64) -> Option<&'static str> {
        self.classes
            .iter()
            .find(|entry| entry.value().0 == id)
            .map(|entry| entry.value().1)
    }
}

impl IdentityTables for InternedIdentities {
    fn thread_id(&self, thread: ThreadId) -> u64 {
        *self
            .threads
            .entry(thread)
            .or_insert_with(|| self.allocate())
    }

    fn class_id(&self, class: ClassRef) -> u64 {
        self.classes
            .entry(class.type_id)
            .or_insert_with(|| (self.allocate(), class.name))
            .0
    }
}
