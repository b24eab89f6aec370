//! Reactor Module
//!
//! A single-threaded event loop over a readiness multiplexer.
//!
//! ## Event Loop
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │  poll(timeout)               │<──────────────┐
//!            └──────────────┬───────────────┘               │
//!                           │ ready events                  │
//!              ┌────────────┴────────────┐                  │
//!              ▼                         ▼                  │
//!     ┌─────────────────┐      ┌──────────────────┐         │
//!     │ listener ready  │      │ client ready     │         │
//!     │ accept all,     │      │ one read, serve  │         │
//!     │ subscribe READ  │      │ complete frames  │         │
//!     └────────┬────────┘      └────────┬─────────┘         │
//!              └────────────┬───────────┘                   │
//!                           ▼                               │
//!                 shutdown requested? ──── no ──────────────┘
//! ```
//!
//! The loop only knows the [`Multiplexer`] trait. [`PollMultiplexer`] is the
//! shipped backend; epoll or kqueue backends plug in through
//! [`Server::with_multiplexer`].

pub mod multiplexer;
pub mod poll;
pub mod server;

pub use multiplexer::{Event, Interest, Multiplexer};
pub use poll::PollMultiplexer;
pub use server::{Server, ServerError, ShutdownHandle};
