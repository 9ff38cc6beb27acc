//! Backend configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use homesim_protocol::DEFAULT_PORT;

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Port 0 picks a free port.
    pub bind: SocketAddr,

    /// Idle and I/O timeout for one client connection.
    pub connection_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Value reported as `commissioned` by `GetDeviceState`.
    pub commissioned: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            connection_timeout: Duration::from_secs(30),
            max_connections: 32,
            commissioned: false,
        }
    }
}

impl ServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Default::default()
        }
    }

    /// Loopback on a port chosen by the OS.
    pub fn ephemeral() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_commissioned(mut self, commissioned: bool) -> Self {
        self.commissioned = commissioned;
        self
    }
}
