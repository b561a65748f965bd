//! # xproxy
//!
//! A pub/sub forwarding proxy in the style of a ZeroMQ XSUB/XPUB device.
//!
//! Publishers connect to the *frontend* (publisher-facing) endpoint and send
//! multi-part messages whose first part is the topic. Subscribers connect to
//! the *backend* (subscriber-facing) endpoint and send subscribe/unsubscribe
//! control frames. The relay keeps an aggregate, reference-counted set of
//! filters and forwards a message only when some filter is a byte-prefix of
//! its topic.
//!
//! ```text
//!   [Publisher] ──data──►  frontend  ──► Relay ──► backend ──data──► [Subscriber]
//!   [Publisher] ◄─ctrl───  (XSUB)    ◄── Relay ◄── (XPUB)  ◄─ctrl─── [Subscriber]
//!                                         │
//!                                 SubscriptionRegistry
//! ```
//!
//! # Example
//! ```no_run
//! use xproxy::{Proxy, ProxyConfig};
//!
//! # async fn example() -> xproxy::Result<()> {
//! let proxy = Proxy::bind(ProxyConfig::default()).await?;
//! proxy.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::Message;
pub use registry::{ControlFrame, ControlKind, Filter, SubscriptionRegistry};
pub use relay::{ChannelEndpoint, Endpoint, EndpointRole, Relay, RelayHandle, RelayState};
pub use server::{Proxy, ProxyConfig, SocketEndpoint};
pub use stats::{RelayStats, StatsSnapshot};
