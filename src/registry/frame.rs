//! Filter and control frame types
//!
//! A control frame travels as a single part: one command byte followed by the
//! filter bytes.
//!
//! ```text
//! +---------+------------------+
//! | 0x01/00 | filter bytes ... |
//! +---------+------------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::{CMD_SUBSCRIBE, CMD_UNSUBSCRIBE};
use crate::protocol::Message;

use super::error::ControlFrameError;

/// A subscription prefix
///
/// The empty filter matches every topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Filter(Bytes);

impl Filter {
    /// Create a filter from its bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The filter that matches everything
    pub fn all() -> Self {
        Self(Bytes::new())
    }

    /// Check if this filter matches every topic
    pub fn is_match_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if this filter is a byte-prefix of `topic`
    pub fn matches(&self, topic: &[u8]) -> bool {
        topic.starts_with(&self.0)
    }

    /// Raw filter bytes
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl AsRef<[u8]> for Filter {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_match_all() {
            write!(f, "<all>")
        } else {
            write!(f, "{}", self.0.escape_ascii())
        }
    }
}

/// Kind of control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Subscribe,
    Unsubscribe,
}

impl ControlKind {
    /// Wire command byte
    pub fn command(self) -> u8 {
        match self {
            ControlKind::Subscribe => CMD_SUBSCRIBE,
            ControlKind::Unsubscribe => CMD_UNSUBSCRIBE,
        }
    }
}

/// A subscribe or unsubscribe notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub kind: ControlKind,
    pub filter: Filter,
}

impl ControlFrame {
    /// Create a subscribe frame
    pub fn subscribe(filter: impl Into<Bytes>) -> Self {
        Self {
            kind: ControlKind::Subscribe,
            filter: Filter::new(filter),
        }
    }

    /// Create an unsubscribe frame
    pub fn unsubscribe(filter: impl Into<Bytes>) -> Self {
        Self {
            kind: ControlKind::Unsubscribe,
            filter: Filter::new(filter),
        }
    }

    /// Decode a control frame from a single wire part
    pub fn decode(part: &Bytes) -> Result<Self, ControlFrameError> {
        let (&cmd, _) = part.split_first().ok_or(ControlFrameError::Empty)?;

        let kind = match cmd {
            CMD_SUBSCRIBE => ControlKind::Subscribe,
            CMD_UNSUBSCRIBE => ControlKind::Unsubscribe,
            other => return Err(ControlFrameError::UnknownCommand(other)),
        };

        Ok(Self {
            kind,
            filter: Filter::new(part.slice(1..)),
        })
    }

    /// Decode a control frame from a received message
    pub fn from_message(msg: &Message) -> Result<Self, ControlFrameError> {
        match msg.parts() {
            [] => Err(ControlFrameError::Empty),
            [part] => Self::decode(part),
            parts => Err(ControlFrameError::MultiPart(parts.len())),
        }
    }

    /// Encode to a single wire part
    pub fn encode(&self) -> Bytes {
        let filter = self.filter.as_bytes();
        let mut buf = BytesMut::with_capacity(1 + filter.len());
        buf.put_u8(self.kind.command());
        buf.put_slice(filter);
        buf.freeze()
    }

    /// Encode as a single-part message
    pub fn to_message(&self) -> Message {
        Message::single(self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_prefix_match() {
        let filter = Filter::new("topic1");

        assert!(filter.matches(b"topic1"));
        assert!(filter.matches(b"topic12"));
        assert!(!filter.matches(b"topic"));
        assert!(!filter.matches(b"topic2"));
        assert!(!filter.matches(b""));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = Filter::all();

        assert!(filter.is_match_all());
        assert!(filter.matches(b""));
        assert!(filter.matches(b"anything"));
        assert_eq!(filter.to_string(), "<all>");
    }

    #[test]
    fn test_filter_display_escapes_binary() {
        let filter = Filter::new(&b"a\x00b"[..]);
        assert_eq!(filter.to_string(), "a\\x00b");
    }

    #[test]
    fn test_decode_subscribe() {
        let frame = ControlFrame::decode(&Bytes::from_static(b"\x01news")).unwrap();

        assert_eq!(frame.kind, ControlKind::Subscribe);
        assert_eq!(frame.filter, Filter::new("news"));
    }

    #[test]
    fn test_decode_unsubscribe_match_all() {
        let frame = ControlFrame::decode(&Bytes::from_static(b"\x00")).unwrap();

        assert_eq!(frame.kind, ControlKind::Unsubscribe);
        assert!(frame.filter.is_match_all());
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(
            ControlFrame::decode(&Bytes::new()),
            Err(ControlFrameError::Empty)
        );
        assert_eq!(
            ControlFrame::decode(&Bytes::from_static(b"\x02news")),
            Err(ControlFrameError::UnknownCommand(0x02))
        );
    }

    #[test]
    fn test_from_message_rejects_multipart() {
        let msg = Message::from_parts([&b"\x01a"[..], &b"b"[..]]);
        assert_eq!(
            ControlFrame::from_message(&msg),
            Err(ControlFrameError::MultiPart(2))
        );
        assert_eq!(
            ControlFrame::from_message(&Message::default()),
            Err(ControlFrameError::Empty)
        );
    }

    #[test]
    fn test_encode_matches_wire_format() {
        assert_eq!(ControlFrame::subscribe("ab").encode().as_ref(), b"\x01ab");
        assert_eq!(ControlFrame::unsubscribe("").encode().as_ref(), b"\x00");

        let frame = ControlFrame::unsubscribe("topic1");
        assert_eq!(ControlFrame::from_message(&frame.to_message()), Ok(frame));
    }
}
