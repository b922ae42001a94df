// src/pool/mod.rs
//! Collaborators the writer consults while encoding fields
//!
//! - **String Pool**: interns repeated strings into the current chunk's
//!   constant pool
//! - **Identity Tables**: stable numeric ids for threads and classes

pub mod identity;
pub mod string_pool;

pub use identity::{ClassRef, IdentityTables, InternedIdentities};
pub use string_pool::{InMemoryStringPool, StringPool, ThreadKind};
