//! Client helpers
//!
//! Minimal peers speaking the proxy's wire protocol:
//! - [`Publisher`] sends data frames to the frontend and sees the
//!   subscriptions relayed upstream
//! - [`Subscriber`] manages filters on the backend and receives matching
//!   data frames

pub mod publisher;
pub mod subscriber;

pub use publisher::Publisher;
pub use subscriber::Subscriber;
