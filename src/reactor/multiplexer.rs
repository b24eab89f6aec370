//! Readiness multiplexer contract.
//!
//! The event loop only ever talks to this trait. A backend answers one
//! question: which of the subscribed descriptors can make progress right
//! now, without blocking on any single one of them.

use bitflags::bitflags;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

bitflags! {
    /// Readiness a descriptor is subscribed for, or reported with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// A descriptor paired with an interest set.
///
/// Passed in to [`Multiplexer::subscribe`] and handed back by
/// [`Multiplexer::poll`] with the readiness actually observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub fd: RawFd,
    pub interest: Interest,
}

impl Event {
    pub fn new(fd: RawFd, interest: Interest) -> Self {
        Self { fd, interest }
    }

    pub fn readable(fd: RawFd) -> Self {
        Self::new(fd, Interest::READ)
    }

    pub fn is_readable(&self) -> bool {
        self.interest.contains(Interest::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.interest.contains(Interest::WRITE)
    }
}

/// Platform readiness facility (poll, epoll, kqueue, ...).
///
/// Descriptors passed to `subscribe` must stay open until they are
/// unsubscribed or the multiplexer is closed.
pub trait Multiplexer {
    /// Registers `event.fd`, or replaces its interest if already registered.
    fn subscribe(&mut self, event: Event) -> io::Result<()>;

    /// Drops the registration for `fd`. Unknown descriptors are ignored.
    fn unsubscribe(&mut self, fd: RawFd) -> io::Result<()>;

    /// Waits up to `timeout` for at least one subscribed descriptor to
    /// become ready. Returns an empty list on timeout. A signal arriving
    /// during the wait is reported as [`io::ErrorKind::Interrupted`].
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Event>>;

    /// Number of registered descriptors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases the backend.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}
