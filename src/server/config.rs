//! Proxy configuration

use std::net::{Ipv4Addr, SocketAddr};

use crate::protocol::constants::*;

/// Proxy configuration options
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Publisher-facing (XSUB) bind address
    pub frontend_addr: SocketAddr,

    /// Subscriber-facing (XPUB) bind address
    pub backend_addr: SocketAddr,

    /// Maximum concurrent peers per endpoint (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Per-peer outbound queue capacity, in messages
    pub high_water_mark: usize,

    /// Capacity of each endpoint's inbound queue toward the relay
    pub inbound_capacity: usize,

    /// Largest accepted message, summed over all parts
    pub max_message_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            frontend_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_FRONTEND_PORT)),
            backend_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_BACKEND_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            inbound_capacity: DEFAULT_HIGH_WATER_MARK,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ProxyConfig {
    /// Create a config with custom bind addresses
    pub fn with_addrs(frontend: SocketAddr, backend: SocketAddr) -> Self {
        Self {
            frontend_addr: frontend,
            backend_addr: backend,
            ..Default::default()
        }
    }

    /// Config bound to ephemeral loopback ports
    pub fn localhost() -> Self {
        let any = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        Self::with_addrs(any, any)
    }

    /// Set the publisher-facing address
    pub fn frontend(mut self, addr: SocketAddr) -> Self {
        self.frontend_addr = addr;
        self
    }

    /// Set the subscriber-facing address
    pub fn backend(mut self, addr: SocketAddr) -> Self {
        self.backend_addr = addr;
        self
    }

    /// Set maximum connections per endpoint
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-peer outbound queue capacity (at least 1)
    pub fn high_water_mark(mut self, hwm: usize) -> Self {
        self.high_water_mark = hwm.max(1);
        self
    }

    /// Set the inbound queue capacity (at least 1)
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Set the maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Toggle TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
