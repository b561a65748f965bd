//! Multi-part message type

use bytes::Bytes;

/// A multi-part message
///
/// The unit every endpoint reads and writes. Parts are never merged or split
/// in transit, and cloning only bumps the reference counts of the parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    parts: Vec<Bytes>,
}

impl Message {
    /// Create a message from its parts
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// Create a single-part message
    pub fn single(part: impl Into<Bytes>) -> Self {
        Self {
            parts: vec![part.into()],
        }
    }

    /// Build a message from anything convertible to byte parts
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// The routing part (first part), if any
    pub fn topic(&self) -> Option<&Bytes> {
        self.parts.first()
    }

    /// All parts in order
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Append a part
    pub fn push(&mut self, part: impl Into<Bytes>) {
        self.parts.push(part.into());
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the message has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Total payload size across all parts
    pub fn payload_size(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }
}

impl From<Vec<Bytes>> for Message {
    fn from(parts: Vec<Bytes>) -> Self {
        Self::new(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        let msg = Message::from_parts(["topic1", "payload"]);

        assert_eq!(msg.len(), 2);
        assert_eq!(msg.topic().unwrap().as_ref(), b"topic1");
        assert_eq!(msg.parts()[1].as_ref(), b"payload");
        assert_eq!(msg.payload_size(), 13);
    }

    #[test]
    fn test_empty_message_has_no_topic() {
        let msg = Message::default();

        assert!(msg.is_empty());
        assert!(msg.topic().is_none());
        assert_eq!(msg.payload_size(), 0);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut msg = Message::single("t");
        msg.push("a");
        msg.push(Bytes::from_static(b"b"));

        let parts: Vec<&[u8]> = msg.parts().iter().map(|p| p.as_ref()).collect();
        assert_eq!(parts, vec![&b"t"[..], b"a", b"b"]);
    }
}
