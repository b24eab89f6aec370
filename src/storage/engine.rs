//! In-Memory Store with Lazy Expiry
//!
//! A single map from keys to [`Entry`] values. The store is owned by the
//! command handler on the reactor thread, so it needs no locking: every
//! operation takes `&self` or `&mut self` and the borrow checker enforces
//! exclusive writes.
//!
//! ## Expiry Model
//!
//! Expiry times are absolute epoch milliseconds supplied by the caller.
//! Nothing sweeps the map in the background. An expired entry stays in
//! memory until it is either overwritten by a `put` or observed by a `get`,
//! which removes it and reports a miss.

use bytes::Bytes;
use std::collections::HashMap;

/// Wire-level sentinel for "never expires".
pub const NO_EXPIRY: i64 = -1;

/// When an entry stops being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    /// Absolute deadline in epoch milliseconds.
    At(i64),
}

impl Expiry {
    /// Deadline `offset_ms` after `now_ms`, saturating at the i64 bounds.
    pub fn after(now_ms: i64, offset_ms: i64) -> Self {
        Expiry::At(now_ms.saturating_add(offset_ms))
    }

    /// An entry is expired once the clock reaches its deadline.
    #[inline]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(deadline) => *deadline <= now_ms,
        }
    }

    /// The deadline in epoch milliseconds, or [`NO_EXPIRY`].
    pub fn as_millis(&self) -> i64 {
        match self {
            Expiry::Never => NO_EXPIRY,
            Expiry::At(deadline) => *deadline,
        }
    }
}

/// Represents a stored value with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Bytes,
    pub expires_at: Expiry,
}

/// Operation counters for the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub set_ops: u64,
    pub get_ops: u64,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because a `get` found them past their deadline
    pub expired: u64,
}

/// The key-value store.
///
/// # Example
///
/// ```
/// use emberkv::storage::{Expiry, Store};
/// use bytes::Bytes;
///
/// let mut store = Store::new();
/// let now = 1_000;
///
/// store.put(Bytes::from("name"), Bytes::from("ember"), Expiry::Never);
/// assert_eq!(store.get(b"name", now), Some(Bytes::from("ember")));
///
/// store.put(Bytes::from("session"), Bytes::from("abc"), Expiry::after(now, 100));
/// assert_eq!(store.get(b"session", now + 100), None);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    data: HashMap<Bytes, Entry>,
    stats: StorageStats,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry and its expiry.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was replaced.
    pub fn put(&mut self, key: Bytes, value: Bytes, expires_at: Expiry) -> bool {
        self.stats.set_ops += 1;
        self.data
            .insert(key, Entry { value, expires_at })
            .is_none()
    }

    /// Looks up `key` as of `now_ms`.
    ///
    /// Returns `None` both when the key is absent and when it has expired;
    /// an expired entry is removed here.
    pub fn get(&mut self, key: &[u8], now_ms: i64) -> Option<Bytes> {
        self.stats.get_ops += 1;

        let (value, expired) = match self.peek(key) {
            Some(entry) if !entry.expires_at.is_expired(now_ms) => (Some(entry.value.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };

        if value.is_some() {
            self.stats.hits += 1;
            return value;
        }

        if expired {
            self.data.remove(key);
            self.stats.expired += 1;
        }
        self.stats.misses += 1;
        None
    }

    /// Returns the raw entry, expired or not, without touching it.
    pub fn peek(&self, key: &[u8]) -> Option<&Entry> {
        self.data.get(key)
    }

    /// Number of entries held, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.data.len() as u64,
            ..self.stats
        }
    }
}
