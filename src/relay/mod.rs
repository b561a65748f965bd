//! Forwarding relay
//!
//! The relay is a single task that owns both endpoints and the subscription
//! registry:
//!
//! ```text
//!              ┌──────────────── Relay task ────────────────┐
//!  pub-facing  │  data  ──► registry.matches(topic)? ──────►│ sub-facing
//!   endpoint   │                                            │  endpoint
//!              │◄────── raw control ◄── apply_control ◄─────│
//!              └────────────────────────────────────────────┘
//! ```
//!
//! Because one task does everything, a control frame is applied before any
//! data frame the loop reads after it, and no lock guards the registry.

pub mod endpoint;
pub mod forwarder;

pub use endpoint::{ChannelEndpoint, Endpoint, EndpointRole};
pub use forwarder::{Relay, RelayHandle, RelayState};
