//! Command Handler Module
//!
//! Receives decoded RESP frames, executes them against the store, and
//! returns the reply to encode.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! `PING`, `ECHO`, `SET`, `GET`, `CONFIG GET`, `SAVE`

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandHandler, SnapshotConfig, DEFAULT_DB_FILENAME, DEFAULT_DIR};
