//! Connection Handler Module
//!
//! Per-client state driven by the reactor. Each time the event loop sees a
//! client descriptor become readable it calls
//! [`Connection::handle_readable`], which performs one non-blocking read
//! and serves every complete frame now sitting in the buffer.
//!
//! ## Readiness Callback
//!
//! ```text
//! 1. Descriptor reported readable
//!        │
//!        ▼
//! 2. One non-blocking read ──── WouldBlock ──> return, stay subscribed
//!        │                 └─── 0 bytes / error ──> caller tears down
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Parse frame from buffer     │<──┐
//!    │  Execute command             │   │ while a complete
//!    │  Encode reply                │───┘ frame is buffered
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Write all replies in one go
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol - a read can end in the middle of a frame, or
//! carry several frames. Bytes accumulate in a `BytesMut` until the parser
//! reports a complete frame, and consumed bytes are dropped from the front.
//! A decode error answers `-ERR invalid command` and discards the buffer;
//! the connection itself stays open.
//!
//! The parser bounds each line and each declared bulk length, so a pending
//! frame only grows as far as its headers allow. A buffer past
//! `MAX_BUFFER_SIZE` still waiting for a frame closes the connection.

use crate::commands::CommandHandler;
use crate::protocol::parser::{MAX_BULK_SIZE, MAX_INLINE_LEN};
use crate::protocol::RespParser;
use crate::reactor::Interest;
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, trace, warn};

/// Maximum bytes buffered without a complete frame: one maximal bulk
/// payload plus room for the headers around it
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 16 * MAX_INLINE_LEN;

/// Bytes requested from the socket per readiness event
const READ_CHUNK_SIZE: usize = 4096;

/// Reply sent for any frame that fails to decode
pub const ERR_INVALID_COMMAND: &[u8] = b"-ERR invalid command\r\n";

/// Counters for connection handling.
///
/// Owned by the event loop; every update happens on the loop thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: u64,
    /// Currently open connections
    pub active_connections: u64,
    /// Total commands processed
    pub commands_processed: u64,
    /// Frames rejected by the decoder
    pub protocol_errors: u64,
    /// Total bytes read
    pub bytes_read: u64,
    /// Total bytes written
    pub bytes_written: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&mut self) {
        self.connections_accepted += 1;
        self.active_connections += 1;
    }

    pub fn connection_closed(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }

    pub fn command_processed(&mut self) {
        self.commands_processed += 1;
    }

    pub fn protocol_error(&mut self) {
        self.protocol_errors += 1;
    }

    pub fn bytes_read(&mut self, count: usize) {
        self.bytes_read += count as u64;
    }

    pub fn bytes_written(&mut self, count: usize) {
        self.bytes_written += count as u64;
    }
}

/// Result of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were appended to the buffer
    Data(usize),
    /// Nothing to read right now; not an error
    WouldBlock,
}

/// State for one accepted client.
#[derive(Debug)]
pub struct Connection {
    /// Non-blocking client socket
    stream: TcpStream,

    /// Descriptor the multiplexer knows this connection by
    fd: RawFd,

    /// Client's address (for logging)
    peer: SocketAddr,

    /// Bytes read but not yet consumed by the parser
    buffer: BytesMut,

    parser: RespParser,

    /// Readiness this connection is subscribed for
    interest: Interest,
}

impl Connection {
    /// Wraps an accepted stream, switching it to non-blocking mode.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let fd = stream.as_raw_fd();

        Ok(Self {
            stream,
            fd,
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            parser: RespParser::new(),
            interest: Interest::READ,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Services one readiness notification.
    ///
    /// Reads once, then executes every complete frame in arrival order and
    /// writes the replies back before returning. Errors mean the connection
    /// must be torn down; decode failures are answered in-band instead.
    pub fn handle_readable(
        &mut self,
        handler: &mut CommandHandler,
        stats: &mut ConnectionStats,
    ) -> Result<ReadOutcome, ConnectionError> {
        let outcome = self.read_available()?;
        if let ReadOutcome::Data(n) = outcome {
            stats.bytes_read(n);

            let replies = self.process_buffer(handler, stats);
            if !replies.is_empty() {
                self.send(&replies, stats)?;
            }

            if self.buffer.len() > MAX_BUFFER_SIZE {
                warn!(
                    fd = self.fd,
                    peer = %self.peer,
                    size = self.buffer.len(),
                    "Buffer size limit exceeded"
                );
                return Err(ConnectionError::BufferFull);
            }
        }
        Ok(outcome)
    }

    /// Performs exactly one non-blocking read into the buffer.
    fn read_available(&mut self) -> Result<ReadOutcome, ConnectionError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        match self.stream.read(&mut chunk) {
            Ok(0) => Err(ConnectionError::ClientDisconnected),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                trace!(fd = self.fd, bytes = n, "Read data");
                Ok(ReadOutcome::Data(n))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(ReadOutcome::WouldBlock)
            }
            Err(e) => Err(ConnectionError::IoError(e)),
        }
    }

    /// Executes every complete frame in the buffer and returns the encoded replies.
    fn process_buffer(
        &mut self,
        handler: &mut CommandHandler,
        stats: &mut ConnectionStats,
    ) -> Vec<u8> {
        let mut replies = Vec::new();

        while !self.buffer.is_empty() {
            match self.parser.parse(&self.buffer) {
                Ok(Some((frame, consumed))) => {
                    self.buffer.advance(consumed);
                    trace!(
                        fd = self.fd,
                        consumed = consumed,
                        remaining = self.buffer.len(),
                        "Parsed command"
                    );

                    let reply = handler.execute(frame);
                    stats.command_processed();
                    reply.serialize_into(&mut replies);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(fd = self.fd, peer = %self.peer, error = %e, "Parse error");
                    self.reject_buffer(&mut replies, stats);
                    break;
                }
            }
        }

        replies
    }

    fn reject_buffer(&mut self, replies: &mut Vec<u8>, stats: &mut ConnectionStats) {
        self.buffer.clear();
        stats.protocol_error();
        replies.extend_from_slice(ERR_INVALID_COMMAND);
    }

    /// Writes replies synchronously. The socket is non-blocking, so a peer
    /// that stops reading surfaces here as a `WouldBlock` I/O error.
    fn send(&mut self, bytes: &[u8], stats: &mut ConnectionStats) -> Result<(), ConnectionError> {
        self.stream.write_all(bytes)?;
        stats.bytes_written(bytes.len());
        trace!(fd = self.fd, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!(fd = self.fd, peer = %self.peer, "Connection closed");
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Peer closed its side of the connection
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}
