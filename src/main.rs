//! xproxy - standalone pub/sub forwarding proxy
//!
//! Run with: xproxy [--frontend ADDR] [--backend ADDR]
//!
//! Publishers connect to the frontend (default 0.0.0.0:1234), subscribers to
//! the backend (default 0.0.0.0:5678). Logging follows `RUST_LOG`.

use std::net::SocketAddr;

use clap::Parser;

use xproxy::protocol::constants::{DEFAULT_HIGH_WATER_MARK, DEFAULT_MAX_MESSAGE_SIZE};
use xproxy::{Proxy, ProxyConfig};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "xproxy", version, about = "XSUB/XPUB pub/sub forwarding proxy")]
struct Args {
    /// Publisher-facing bind address
    #[arg(long, default_value = "0.0.0.0:1234")]
    frontend: SocketAddr,

    /// Subscriber-facing bind address
    #[arg(long, default_value = "0.0.0.0:5678")]
    backend: SocketAddr,

    /// Maximum peers per endpoint (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Per-peer outbound queue capacity, in messages
    #[arg(long, default_value_t = DEFAULT_HIGH_WATER_MARK)]
    hwm: usize,

    /// Maximum message size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        ProxyConfig::with_addrs(self.frontend, self.backend)
            .max_connections(self.max_connections)
            .high_water_mark(self.hwm)
            .inbound_capacity(self.hwm)
            .max_message_size(self.max_message_size)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xproxy=info".into()),
        )
        .init();

    let config = Args::parse().into_config();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        frontend = %config.frontend_addr,
        backend = %config.backend_addr,
        hwm = config.high_water_mark,
        "Starting proxy"
    );

    let proxy = Proxy::bind(config).await?;
    println!(
        "Intermediary started on {} (publishers) / {} (subscribers)",
        proxy.frontend_addr(),
        proxy.backend_addr()
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    match proxy.run_until(shutdown).await {
        Ok(()) => tracing::info!("Proxy shutdown complete"),
        Err(e) => {
            tracing::error!(error = %e, "Proxy error");
            return Err(e.into());
        }
    }

    Ok(())
}
