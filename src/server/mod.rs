//! TCP proxy server
//!
//! Binds the two socket endpoints and runs a relay between them.

pub mod config;
pub mod listener;
mod peer;
pub mod proxy;

pub use config::ProxyConfig;
pub use listener::SocketEndpoint;
pub use proxy::Proxy;
