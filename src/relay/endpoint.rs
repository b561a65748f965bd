//! Endpoint abstraction
//!
//! An endpoint is a many-peer message socket seen as a single duplex stream
//! of multi-part messages. Peer identity never reaches the relay.

use std::future::Future;
use std::io;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::Message;

/// Which side of the proxy an endpoint faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    /// Publishers connect here (XSUB side, a.k.a. frontend)
    PublisherFacing,
    /// Subscribers connect here (XPUB side, a.k.a. backend)
    SubscriberFacing,
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointRole::PublisherFacing => write!(f, "publisher-facing"),
            EndpointRole::SubscriberFacing => write!(f, "subscriber-facing"),
        }
    }
}

/// A bidirectional message endpoint driven by the relay
pub trait Endpoint: Send {
    /// Receive the next inbound message
    ///
    /// Returns `Ok(None)` once the endpoint can produce no more messages.
    /// Must be cancel-safe: the relay waits on both endpoints at once and
    /// drops whichever future loses.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Message>>> + Send;

    /// Send a message, waiting while the endpoint has no room for it
    ///
    /// The whole message is accepted or none of it is. Failures isolated to
    /// a single peer are handled inside the endpoint and do not surface here.
    fn send(&mut self, msg: Message) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory endpoint backed by bounded channels
///
/// Created in connected pairs: whatever one side sends, the other receives.
/// A full channel makes `send` wait, which is how backpressure reaches the
/// relay.
#[derive(Debug)]
pub struct ChannelEndpoint {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
}

impl ChannelEndpoint {
    /// Create two connected endpoints, each direction holding `capacity` messages
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);

        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

impl Endpoint for ChannelEndpoint {
    async fn recv(&mut self) -> Result<Option<Message>> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        self.tx.send(msg).await.map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel endpoint peer dropped",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_connected_both_ways() {
        let (mut a, mut b) = ChannelEndpoint::pair(4);

        a.send(Message::from_parts(["ping"])).await.unwrap();
        b.send(Message::from_parts(["pong", "x"])).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some(Message::from_parts(["ping"])));
        assert_eq!(
            a.recv().await.unwrap(),
            Some(Message::from_parts(["pong", "x"]))
        );
    }

    #[tokio::test]
    async fn test_dropped_peer() {
        let (mut a, b) = ChannelEndpoint::pair(4);
        drop(b);

        assert!(a.recv().await.unwrap().is_none());
        assert!(a.send(Message::single("x")).await.is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(EndpointRole::PublisherFacing.to_string(), "publisher-facing");
        assert_eq!(EndpointRole::SubscriberFacing.to_string(), "subscriber-facing");
    }
}
