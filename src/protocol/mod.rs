//! Wire protocol
//!
//! Multi-part message framing shared by both endpoints and the client helpers.
//!
//! Each part travels as a 5-byte header followed by its payload:
//!
//! ```text
//! +-------+---------------------+-------------------+
//! | flags | length (u32, BE)    | payload (length)  |
//! +-------+---------------------+-------------------+
//!   0x01 = MORE: another part of the same message follows
//! ```

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{encode_message, read_message, write_message};
pub use message::Message;
