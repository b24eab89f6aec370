//! # EmberKV - A Minimal RESP Key-Value Server
//!
//! EmberKV speaks the Redis serialization protocol (RESP) and keeps string
//! values in memory, optionally with a time-to-live. Every client is served
//! by one thread running a readiness-driven event loop.
//!
//! ## Features
//!
//! - **Redis-Compatible Wire Format**: RESP framing, usable from `redis-cli`
//! - **Single-Threaded Reactor**: `poll(2)` multiplexing, no locks anywhere
//! - **TTL Support**: `SET key value PX <ms>` with lazy expiry on read
//! - **Snapshots**: `SAVE` writes a `REDIS0009` snapshot header to disk
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              EmberKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ Event Loop  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (reactor)   │    │  (per fd)   │    │  Handler    │                  │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │         │                  │                  │                         │
//! │         ▼                  ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ Multiplexer │    │ RESP Parser │    │   Store     │                  │
//! │  │  (poll(2))  │    │ / Encoder   │    │ (lazy TTL)  │                  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use emberkv::commands::CommandHandler;
//! use emberkv::config::ServerConfig;
//! use emberkv::reactor::Server;
//! use emberkv::storage::Store;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = CommandHandler::new(Store::new());
//!     let server = Server::bind(ServerConfig::default(), handler)?;
//!     server.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `CONFIG GET dir|dbfilename`
//! - `SAVE`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP parser and types
//! - [`storage`]: Key space with lazy TTL, plus the clock it reads
//! - [`commands`]: Command dispatch
//! - [`connection`]: Per-client buffering and the read/serve cycle
//! - [`reactor`]: Multiplexer trait, `poll(2)` backend, and the event loop
//! - [`config`]: Server settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod reactor;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use reactor::{Server, ServerError, ShutdownHandle};
pub use storage::Store;

/// The default port EmberKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
