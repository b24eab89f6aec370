//! The event loop.
//!
//! One thread owns the listener, every client connection, and the command
//! handler (and through it the store). The multiplexer wait is the only
//! place the thread blocks.

use super::multiplexer::{Event, Multiplexer};
use super::poll::PollMultiplexer;
use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionError, ConnectionStats};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cooperative stop signal, checked once per loop tick.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop. Takes effect within one poll timeout.
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    #[error("multiplexer error: {0}")]
    Multiplexer(#[source] io::Error),
}

/// Single-threaded RESP server.
pub struct Server<M: Multiplexer = PollMultiplexer> {
    config: ServerConfig,
    listener: TcpListener,
    listener_fd: RawFd,
    multiplexer: M,
    connections: HashMap<RawFd, Connection>,
    handler: CommandHandler,
    stats: ConnectionStats,
    shutdown: ShutdownHandle,
}

impl Server<PollMultiplexer> {
    /// Binds the listener and prepares a `poll(2)` backed loop.
    pub fn bind(config: ServerConfig, handler: CommandHandler) -> Result<Self, ServerError> {
        // One extra slot for the listener itself
        let multiplexer = PollMultiplexer::new(config.max_clients.saturating_add(1));
        Self::with_multiplexer(config, handler, multiplexer)
    }
}

impl<M: Multiplexer> Server<M> {
    pub fn with_multiplexer(
        config: ServerConfig,
        handler: CommandHandler,
        mut multiplexer: M,
    ) -> Result<Self, ServerError> {
        let listener = bind_listener(&config)?;
        let listener_fd = listener.as_raw_fd();

        multiplexer
            .subscribe(Event::readable(listener_fd))
            .map_err(ServerError::Multiplexer)?;

        Ok(Self {
            config,
            listener,
            listener_fd,
            multiplexer,
            connections: HashMap::new(),
            handler,
            stats: ConnectionStats::new(),
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// Runs the event loop until shutdown is requested.
    ///
    /// Per-connection failures are logged and only close that connection;
    /// a failing poll ends the loop.
    pub fn run(mut self) -> Result<(), ServerError> {
        info!(
            addr = %self.config.bind_address(),
            max_clients = self.config.max_clients,
            "Event loop started"
        );

        while !self.shutdown.is_shutdown() {
            let events = match self.multiplexer.poll(self.config.poll_timeout) {
                Ok(events) => events,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Poll failed");
                    return Err(ServerError::Poll(e));
                }
            };

            for event in events {
                if event.fd == self.listener_fd {
                    self.accept_pending();
                } else if event.is_readable() {
                    self.service(event.fd);
                }
            }
        }

        info!(
            open_connections = self.connections.len(),
            commands_processed = self.stats.commands_processed,
            "Shutting down"
        );
        self.connections.clear();
        self.multiplexer.close().map_err(ServerError::Multiplexer)
    }

    /// Accepts every pending connection on the listener.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    break;
                }
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.connections.len() >= self.config.max_clients {
            warn!(
                peer = %peer,
                max_clients = self.config.max_clients,
                "Connection limit reached, rejecting client"
            );
            return;
        }

        let conn = match Connection::new(stream, peer) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to configure client socket");
                return;
            }
        };

        let fd = conn.fd();
        if let Err(e) = self.multiplexer.subscribe(Event::new(fd, conn.interest())) {
            warn!(peer = %peer, error = %e, "Failed to subscribe client");
            return;
        }

        self.connections.insert(fd, conn);
        self.stats.connection_opened();
        info!(
            fd = fd,
            peer = %peer,
            active = self.stats.active_connections,
            "Client connected"
        );
    }

    fn service(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(&fd) else {
            return;
        };

        match conn.handle_readable(&mut self.handler, &mut self.stats) {
            Ok(_) => {}
            Err(ConnectionError::ClientDisconnected) => {
                debug!(fd = fd, "Client disconnected");
                self.close_connection(fd);
            }
            Err(e) => {
                warn!(fd = fd, error = %e, "Connection error");
                self.close_connection(fd);
            }
        }
    }

    fn close_connection(&mut self, fd: RawFd) {
        if let Err(e) = self.multiplexer.unsubscribe(fd) {
            warn!(fd = fd, error = %e, "Failed to unsubscribe client");
        }
        if let Some(conn) = self.connections.remove(&fd) {
            self.stats.connection_closed();
            info!(
                fd = fd,
                peer = %conn.peer(),
                active = self.stats.active_connections,
                "Client removed"
            );
        }
    }
}

/// Creates a non-blocking, address-reusing listener.
fn bind_listener(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.bind_address();
    let bind_err = |source: io::Error| ServerError::Bind {
        addr: addr.clone(),
        source,
    };

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(bind_err)?
        .next()
        .ok_or_else(|| {
            bind_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            ))
        })?;

    let backlog = i32::try_from(config.max_clients).unwrap_or(i32::MAX);

    let socket = Socket::new(
        Domain::for_address(socket_addr),
        Type::STREAM,
        Some(Protocol::TCP),
    )
    .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&socket_addr.into()).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    Ok(socket.into())
}
