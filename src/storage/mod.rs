//! Storage Module
//!
//! The in-memory key space and the clock that drives its expiry.
//!
//! ## Features
//!
//! - **Single owner**: the store lives on the reactor thread, no locks
//! - **TTL Support**: entries carry an absolute deadline in epoch milliseconds
//! - **Lazy Expiry**: deadlines are checked when a key is read
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::{Clock, Expiry, ManualClock, Store};
//! use bytes::Bytes;
//!
//! let clock = ManualClock::new(10_000);
//! let mut store = Store::new();
//!
//! store.put(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Expiry::after(clock.now_millis(), 3_600_000),
//! );
//! assert!(store.get(b"session", clock.now_millis()).is_some());
//!
//! clock.advance(3_600_000);
//! assert!(store.get(b"session", clock.now_millis()).is_none());
//! ```

pub mod clock;
pub mod engine;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Entry, Expiry, StorageStats, Store, NO_EXPIRY};
