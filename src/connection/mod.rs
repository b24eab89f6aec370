//! Connection Handler Module
//!
//! Per-client state for the reactor: the socket, its read buffer, and the
//! decode → dispatch → encode → write cycle run on each readiness event.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Event Loop                              │
//! │                   (reactor module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ fd readable
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Connection                               │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Parse RESP  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    Connection, ConnectionError, ConnectionStats, ReadOutcome, ERR_INVALID_COMMAND,
};
