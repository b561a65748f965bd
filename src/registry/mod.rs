//! Subscription registry
//!
//! Tracks the aggregate interest of every subscriber behind the
//! subscriber-facing endpoint. Entries are keyed by filter content and
//! reference counted, so two subscribers asking for the same prefix share one
//! entry and the prefix stays live until both have unsubscribed.
//!
//! ```text
//!   sub-facing ──[0x01 "news"]──►  apply_control  ──► { "news": 2, "": 1 }
//!                                                            │
//!   pub-facing ──["news.eu", ..]──►  matches(topic) ◄────────┘
//! ```
//!
//! The registry does not know which peer asked for what; peer bookkeeping, if
//! any, belongs to the endpoint.

pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use entry::SubscriptionEntry;
pub use error::ControlFrameError;
pub use frame::{ControlFrame, ControlKind, Filter};
pub use store::{ControlOutcome, SubscriptionRegistry};
