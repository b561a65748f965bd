//! Control frame error types

/// Reasons a subscriber-facing frame is not a valid control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrameError {
    /// Frame had no bytes (or no parts) at all
    Empty,
    /// Control frames are single-part; this one had more
    MultiPart(usize),
    /// First byte was neither subscribe nor unsubscribe
    UnknownCommand(u8),
}

impl std::fmt::Display for ControlFrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlFrameError::Empty => write!(f, "Empty control frame"),
            ControlFrameError::MultiPart(n) => {
                write!(f, "Control frame has {} parts, expected 1", n)
            }
            ControlFrameError::UnknownCommand(cmd) => {
                write!(f, "Unknown control command: 0x{:02x}", cmd)
            }
        }
    }
}

impl std::error::Error for ControlFrameError {}
