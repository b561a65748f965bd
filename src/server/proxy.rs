//! Proxy server

use std::future::Future;
use std::net::SocketAddr;

use crate::error::Result;
use crate::relay::{EndpointRole, Relay, RelayHandle};
use crate::server::config::ProxyConfig;
use crate::server::listener::SocketEndpoint;

/// XSUB/XPUB proxy over TCP
///
/// Publishers connect to the frontend, subscribers to the backend.
pub struct Proxy {
    relay: Relay<SocketEndpoint, SocketEndpoint>,
    frontend_addr: SocketAddr,
    backend_addr: SocketAddr,
}

impl Proxy {
    /// Bind both endpoints
    pub async fn bind(config: ProxyConfig) -> Result<Self> {
        let frontend =
            SocketEndpoint::bind(EndpointRole::PublisherFacing, config.frontend_addr, &config)
                .await?;
        let backend =
            SocketEndpoint::bind(EndpointRole::SubscriberFacing, config.backend_addr, &config)
                .await?;

        let frontend_addr = frontend.local_addr();
        let backend_addr = backend.local_addr();

        Ok(Self {
            relay: Relay::new(frontend, backend),
            frontend_addr,
            backend_addr,
        })
    }

    /// Publisher-facing address
    pub fn frontend_addr(&self) -> SocketAddr {
        self.frontend_addr
    }

    /// Subscriber-facing address
    pub fn backend_addr(&self) -> SocketAddr {
        self.backend_addr
    }

    /// Handle for shutdown and statistics
    pub fn handle(&self) -> RelayHandle {
        self.relay.handle()
    }

    /// Run until shut down through a [`RelayHandle`] or an endpoint fails
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            frontend = %self.frontend_addr,
            backend = %self.backend_addr,
            "Proxy started"
        );
        self.relay.run().await
    }

    /// Run with graceful shutdown
    ///
    /// When `shutdown` completes the relay finishes its in-flight frame and
    /// returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.handle();
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                handle.shutdown();
            }
        }

        run.await
    }
}
