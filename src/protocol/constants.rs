//! Protocol constants

/// Size of a part header (flags + length)
pub const PART_HEADER_SIZE: usize = 5;

/// Flag bit: another part of the same message follows
pub const FLAG_MORE: u8 = 0x01;

/// Mask of every flag bit this codec understands
pub const KNOWN_FLAGS: u8 = FLAG_MORE;

/// Control frame command byte: subscribe
pub const CMD_SUBSCRIBE: u8 = 0x01;

/// Control frame command byte: unsubscribe
pub const CMD_UNSUBSCRIBE: u8 = 0x00;

/// Default maximum message size (16 MiB, sum of all parts)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default per-peer outbound queue capacity, in messages
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;

/// Default publisher-facing (XSUB) port
pub const DEFAULT_FRONTEND_PORT: u16 = 1234;

/// Default subscriber-facing (XPUB) port
pub const DEFAULT_BACKEND_PORT: u16 = 5678;
