//! `poll(2)` backend.
//!
//! Portable across POSIX systems. The descriptor set is rebuilt on every
//! call, which is linear in the number of clients - fine for the connection
//! counts this server targets.

use super::multiplexer::{Event, Interest, Multiplexer};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::HashMap;
use std::io;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::time::Duration;
use tracing::trace;

/// Multiplexer backed by the POSIX `poll` system call.
#[derive(Debug)]
pub struct PollMultiplexer {
    registrations: HashMap<RawFd, Interest>,
    capacity: usize,
}

impl PollMultiplexer {
    /// Creates a backend that accepts at most `capacity` descriptors.
    pub fn new(capacity: usize) -> Self {
        Self {
            registrations: HashMap::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Multiplexer for PollMultiplexer {
    fn subscribe(&mut self, event: Event) -> io::Result<()> {
        if !self.registrations.contains_key(&event.fd) && self.registrations.len() >= self.capacity
        {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("multiplexer capacity of {} descriptors reached", self.capacity),
            ));
        }

        self.registrations.insert(event.fd, event.interest);
        trace!(fd = event.fd, interest = ?event.interest, "Subscribed");
        Ok(())
    }

    fn unsubscribe(&mut self, fd: RawFd) -> io::Result<()> {
        if self.registrations.remove(&fd).is_some() {
            trace!(fd = fd, "Unsubscribed");
        }
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Event>> {
        let subscribed: Vec<(RawFd, Interest)> = self
            .registrations
            .iter()
            .map(|(&fd, &interest)| (fd, interest))
            .collect();

        let mut poll_fds: Vec<PollFd<'_>> = subscribed
            .iter()
            .map(|&(fd, interest)| {
                // SAFETY: callers keep subscribed descriptors open until they
                // unsubscribe, and the borrow does not outlive this call.
                let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
                PollFd::new(borrowed, to_poll_flags(interest))
            })
            .collect();

        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let ready = poll(&mut poll_fds, PollTimeout::from(millis)).map_err(io::Error::from)?;
        if ready == 0 {
            return Ok(Vec::new());
        }

        let events = poll_fds
            .iter()
            .zip(&subscribed)
            .filter_map(|(pfd, &(fd, _))| {
                let revents = pfd.revents().unwrap_or(PollFlags::empty());
                let interest = from_poll_flags(revents);
                (!interest.is_empty()).then(|| Event::new(fd, interest))
            })
            .collect();

        Ok(events)
    }

    fn len(&self) -> usize {
        self.registrations.len()
    }

    fn close(mut self) -> io::Result<()> {
        self.registrations.clear();
        Ok(())
    }
}

fn to_poll_flags(interest: Interest) -> PollFlags {
    let mut flags = PollFlags::empty();
    if interest.contains(Interest::READ) {
        flags |= PollFlags::POLLIN;
    }
    if interest.contains(Interest::WRITE) {
        flags |= PollFlags::POLLOUT;
    }
    flags
}

/// Hang-ups and errors are reported as readable so the next read observes them.
fn from_poll_flags(flags: PollFlags) -> Interest {
    let mut interest = Interest::empty();
    if flags.intersects(
        PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL,
    ) {
        interest |= Interest::READ;
    }
    if flags.contains(PollFlags::POLLOUT) {
        interest |= Interest::WRITE;
    }
    interest
}
