//! Subscriber peer

use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::constants::DEFAULT_MAX_MESSAGE_SIZE;
use crate::protocol::{read_message, write_message, Message};
use crate::registry::ControlFrame;

/// Subscriber connected to a proxy backend
pub struct Subscriber {
    stream: TcpStream,
    max_message_size: usize,
}

impl Subscriber {
    /// Connect to the subscriber-facing endpoint
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        })
    }

    /// Limit the size of received messages
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Subscribe to topics starting with `filter` (empty = everything)
    pub async fn subscribe(&mut self, filter: impl Into<Bytes>) -> Result<()> {
        self.send_control(ControlFrame::subscribe(filter)).await
    }

    /// Drop one subscription to `filter`
    pub async fn unsubscribe(&mut self, filter: impl Into<Bytes>) -> Result<()> {
        self.send_control(ControlFrame::unsubscribe(filter)).await
    }

    async fn send_control(&mut self, frame: ControlFrame) -> Result<()> {
        write_message(&mut self.stream, &frame.to_message()).await
    }

    /// Receive the next delivered message
    ///
    /// Returns `Ok(None)` when the proxy closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        read_message(&mut self.stream, self.max_message_size).await
    }
}
