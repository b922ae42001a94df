// src/encoding/mod.rs
//! Binary encodings used by the event writer
//!
//! - **varint**: 7-bits-per-byte unsigned integers and the fixed 4-byte
//!   padded form used for back-patched size headers
//! - **string**: inline vs. constant-pool string encoding decision
//!
//! # Wire layout of one event
//!
//! ```text
//! [size: 1 byte | 4-byte padded varint][type id: varint][fields...]
//!
//! bool            1 byte (0 | 1)
//! byte..long      varint of the unsigned bit pattern (1-9 bytes)
//! float / double  4 / 8 bytes, big-endian
//! string          tag byte + payload
//! thread / class  varint identity, 0 = null
//! ```

pub mod string;
pub mod varint;

pub use string::{StringEncoding, StringEncoder, StringTag};
pub use varint::{MAX_PADDED_VALUE, MAX_VARINT_LEN, PADDED_LEN};
