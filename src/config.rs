//! Server configuration.

use std::time::Duration;

/// Default number of concurrently connected clients
pub const DEFAULT_MAX_CLIENTS: usize = 2000;

/// Default upper bound on a single multiplexer wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Settings for [`Server`](crate::reactor::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on; `0` lets the OS pick one
    pub port: u16,
    /// Connections beyond this are closed right after accept.
    /// Also used as the listen backlog.
    pub max_clients: usize,
    /// How long one poll may block; bounds shutdown latency
    pub poll_timeout: Duration,
}

impl ServerConfig {
    /// Returns the bind address string (host:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}
