//! Error types
//!
//! Per-message problems (malformed control frames, unmatched publications) are
//! absorbed by the relay and never show up here. This type carries the
//! failures that end a peer connection or, when they come from an endpoint
//! itself, the whole relay.

use std::fmt;
use std::io;

use crate::relay::EndpointRole;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for proxy operations
#[derive(Debug)]
pub enum Error {
    /// Underlying socket I/O failed
    Io(io::Error),
    /// An endpoint stopped producing frames and cannot be used any more
    EndpointClosed(EndpointRole),
    /// A message exceeded the configured size limit
    MessageTooLarge { size: usize, max: usize },
    /// A part header carried flag bits this codec does not know
    InvalidFlags(u8),
    /// Attempted to send a message with no parts
    EmptyMessage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::EndpointClosed(role) => write!(f, "{} endpoint closed", role),
            Error::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            Error::InvalidFlags(flags) => write!(f, "Invalid part flags: 0x{:02x}", flags),
            Error::EmptyMessage => write!(f, "Message has no parts"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl Error {
    /// Whether this error only concerns a single peer connection
    ///
    /// Peer-scoped errors close that peer; everything else is fatal for the
    /// endpoint that produced it.
    pub fn is_peer_scoped(&self) -> bool {
        match self {
            Error::Io(e) => is_connection_error(e),
            Error::MessageTooLarge { .. } | Error::InvalidFlags(_) | Error::EmptyMessage => true,
            Error::EndpointClosed(_) => false,
        }
    }
}

/// I/O errors that end one connection and say nothing about the socket
/// that accepted it
pub(crate) fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

/// Out of file descriptors, kernel buffers or memory
///
/// Temporary: the limit clears as soon as connections close.
pub(crate) fn is_resource_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory || e.raw_os_error().is_some_and(exhausted_os_code)
}

#[cfg(unix)]
fn exhausted_os_code(code: i32) -> bool {
    matches!(
        code,
        libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
    )
}

#[cfg(not(unix))]
fn exhausted_os_code(_code: i32) -> bool {
    false
}
