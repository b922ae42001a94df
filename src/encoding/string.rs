// src/encoding/string.rs
//! String field encoding
//!
//! Each string is written as one tag byte followed by a tag-specific payload.
//! The decision is made in a fixed order:
//!
//! 1. `None` → `NULL`
//! 2. `""` → `EMPTY_STRING`
//! 3. length strictly inside `(min_limit, max_limit)` and the pool accepts
//!    it → `CONSTANT_POOL` + varint id
//! 4. anything else → `CHAR_ARRAY` + varint length + one varint per UTF-16
//!    code unit
//!
//! Short strings gain nothing from pooling and very long ones rarely repeat,
//! so only the window in between is offered to the pool.

use crate::encoding::varint;
use crate::pool::string_pool::{StringPool, ThreadKind};
use crate::utils::config::StringPoolSettings;
use std::sync::Arc;

/// Tag byte preceding every string payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StringTag {
    Null = 0,
    EmptyString = 1,
    ConstantPool = 2,
    /// Reserved, never produced by this writer
    Utf8 = 3,
    CharArray = 4,
    /// Reserved, never produced by this writer
    Latin1 = 5,
}

/// How a particular string value will be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Null,
    Empty,
    Pooled(u64),
    /// Inline, `len` UTF-16 code units
    CharArray { len: usize },
}

impl StringEncoding {
    pub fn tag(&self) -> StringTag {
        match self {
            StringEncoding::Null => StringTag::Null,
            StringEncoding::Empty => StringTag::EmptyString,
            StringEncoding::Pooled(_) => StringTag::ConstantPool,
            StringEncoding::CharArray { .. } => StringTag::CharArray,
        }
    }

    /// Upper bound on the encoded size, used for the capacity check
    pub fn max_encoded_len(&self) -> usize {
        match self {
            StringEncoding::Null | StringEncoding::Empty => 1,
            StringEncoding::Pooled(id) => 1 + varint::encoded_len(*id),
            // A UTF-16 unit is at most 16 bits, i.e. three varint bytes
            StringEncoding::CharArray { len } => {
                1 + varint::encoded_len(*len as u64) + 3 * len
            }
        }
    }

    /// Write tag and payload into `out`, returning the bytes written.
    ///
    /// `out` must hold at least [`max_encoded_len`](Self::max_encoded_len)
    /// bytes and `value` must be the string this encoding was chosen for.
    pub fn write(&self, value: Option<&str>, out: &mut [u8]) -> usize {
        out[0] = self.tag() as u8;
        match self {
            StringEncoding::Null | StringEncoding::Empty => 1,
            StringEncoding::Pooled(id) => 1 + varint::encode(*id, &mut out[1..]),
            StringEncoding::CharArray { len } => {
                let mut pos = 1 + varint::encode(*len as u64, &mut out[1..]);
                for unit in value.unwrap_or_default().encode_utf16() {
                    pos += varint::encode(u64::from(unit), &mut out[pos..]);
                }
                pos
            }
        }
    }
}

/// Chooses between inline and pooled string encodings
#[derive(Clone)]
pub struct StringEncoder {
    min_limit: usize,
    max_limit: usize,
    pool: Option<Arc<dyn StringPool>>,
}

impl StringEncoder {
    /// Encoder that never pools
    pub fn inline_only() -> Self {
        let defaults = StringPoolSettings::default();
        Self {
            min_limit: defaults.min_limit,
            max_limit: defaults.max_limit,
            pool: None,
        }
    }

    /// Encoder backed by `pool` with the configured length window
    pub fn with_pool(pool: Arc<dyn StringPool>, settings: &StringPoolSettings) -> Self {
        Self {
            min_limit: settings.min_limit,
            max_limit: settings.max_limit,
            pool: Some(pool),
        }
    }

    /// Same limits, pooling switched off
    pub fn without_pool(&self) -> Self {
        Self {
            pool: None,
            ..self.clone()
        }
    }

    pub fn has_pool(&self) -> bool {
        self.pool.is_some()
    }

    /// Decide how `value` is written
    pub fn classify(&self, value: Option<&str>, kind: ThreadKind) -> StringEncoding {
        let text = match value {
            None => return StringEncoding::Null,
            Some("") => return StringEncoding::Empty,
            Some(text) => text,
        };

        let len = text.encode_utf16().count();
        if len > self.min_limit && len < self.max_limit {
            if let Some(pool) = &self.pool {
                let id = pool.add_string(text, kind);
                if id > 0 {
                    return StringEncoding::Pooled(id as u64);
                }
            }
        }

        StringEncoding::CharArray { len }
    }

    /// Classify and encode into a fresh vector
    pub fn encode_to_vec(&self, value: Option<&str>, kind: ThreadKind) -> Vec<u8> {
        let encoding = self.classify(value, kind);
        let mut out = vec![0u8; encoding.max_encoded_len()];
        let written = encoding.write(value, &mut out);
        out.truncate(written);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Pool that hands out sequential ids and counts calls
    #[derive(Default)]
    struct CountingPool {
        ids: Mutex<HashMap<String, i64>>,
        calls: AtomicUsize,
    }

    impl StringPool for CountingPool {
        fn add_string(&self, text: &str, _kind: ThreadKind) -> i64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut ids = self.ids.lock().unwrap();
            let next = ids.len() as i64 + 1;
            *ids.entry(text.to_string()).or_insert(next)
        }
    }

    struct RefusingPool;

    impl StringPool for RefusingPool {
        fn add_string(&self, _text: &str, _kind: ThreadKind) -> i64 {
            -1
        }
    }

    fn encoder(pool: Arc<dyn StringPool>) -> StringEncoder {
        StringEncoder::with_pool(pool, &StringPoolSettings::default())
    }

    #[test]
    fn test_null_and_empty() {
        let encoder = StringEncoder::inline_only();
        assert_eq!(encoder.encode_to_vec(None, ThreadKind::Platform), vec![0]);
        assert_eq!(encoder.encode_to_vec(Some(""), ThreadKind::Platform), vec![1]);
    }

    #[test]
    fn test_pooled_strings_share_ids() {
        let pool = Arc::new(CountingPool::default());
        let encoder = encoder(pool.clone());
        let text = "x".repeat(17);

        let first = encoder.encode_to_vec(Some(&text), ThreadKind::Platform);
        let second = encoder.encode_to_vec(Some(&text), ThreadKind::Platform);
        assert_eq!(first[0], StringTag::ConstantPool as u8);
        assert_eq!(first, second);
        assert_eq!(pool.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        let pool = Arc::new(CountingPool::default());
        let encoder = encoder(pool.clone());

        for len in [1, 15, 16, 128, 500] {
            let text = "y".repeat(len);
            let encoding = encoder.classify(Some(&text), ThreadKind::Platform);
            assert_eq!(encoding, StringEncoding::CharArray { len }, "len {}", len);
        }
        assert_eq!(pool.calls.load(Ordering::SeqCst), 0);

        for len in [17, 127] {
            let text = "z".repeat(len);
            let encoding = encoder.classify(Some(&text), ThreadKind::Platform);
            assert!(matches!(encoding, StringEncoding::Pooled(_)), "len {}", len);
        }
    }

    #[test]
    fn test_refused_pool_falls_back_inline() {
        let encoder = encoder(Arc::new(RefusingPool));
        let text = "w".repeat(40);
        assert_eq!(
            encoder.classify(Some(&text), ThreadKind::Virtual),
            StringEncoding::CharArray { len: 40 }
        );
    }

    #[test]
    fn test_char_array_layout() {
        let encoder = StringEncoder::inline_only();
        // 'é' is one UTF-16 unit (0xE9, two varint bytes), '😀' is two units
        let bytes = encoder.encode_to_vec(Some("aé😀"), ThreadKind::Platform);

        assert_eq!(bytes[0], StringTag::CharArray as u8);
        assert_eq!(bytes[1], 4);
        assert_eq!(bytes[2], b'a');
        assert_eq!(&bytes[3..5], &[0xE9, 0x01]);

        let (high, n) = varint::decode(&bytes[5..]).unwrap();
        assert_eq!(high, 0xD83D);
        let (low, _) = varint::decode(&bytes[5 + n..]).unwrap();
        assert_eq!(low, 0xDE00);
    }

    #[test]
    fn test_max_encoded_len_is_an_upper_bound() {
        let encoder = StringEncoder::inline_only();
        let text = "\u{FFFF}".repeat(10);
        let encoding = encoder.classify(Some(&text), ThreadKind::Platform);
        let bytes = encoder.encode_to_vec(Some(&text), ThreadKind::Platform);
        assert_eq!(bytes.len(), encoding.max_encoded_len());
    }

    #[test]
    fn test_without_pool() {
        let encoder = encoder(Arc::new(CountingPool::default())).without_pool();
        assert!(!encoder.has_pool());
        let text = "v".repeat(20);
        assert_eq!(
            encoder.classify(Some(&text), ThreadKind::Platform),
            StringEncoding::CharArray { len: 20 }
        );
    }
}
