//! Publisher peer

use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::constants::DEFAULT_MAX_MESSAGE_SIZE;
use crate::protocol::{read_message, write_message, Message};
use crate::registry::ControlFrame;

/// Publisher connected to a proxy frontend
///
/// # Example
/// ```no_run
/// use xproxy::client::Publisher;
/// use xproxy::Message;
///
/// # async fn example() -> xproxy::Result<()> {
/// let mut publisher = Publisher::connect("127.0.0.1:1234").await?;
/// publisher.send(&Message::from_parts(["topic1", "payload"])).await?;
/// # Ok(())
/// # }
/// ```
pub struct Publisher {
    stream: TcpStream,
}

impl Publisher {
    /// Connect to the publisher-facing endpoint
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Publish a multi-part message
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        write_message(&mut self.stream, msg).await
    }

    /// Wait for the next subscription change relayed by the proxy
    ///
    /// Returns `Ok(None)` when the proxy closes the connection. Frames that
    /// are not control frames are skipped.
    pub async fn next_subscription(&mut self) -> Result<Option<ControlFrame>> {
        while let Some(msg) = read_message(&mut self.stream, DEFAULT_MAX_MESSAGE_SIZE).await? {
            match ControlFrame::from_message(&msg) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => tracing::warn!(error = %e, "Ignoring non-control frame from proxy"),
            }
        }

        Ok(None)
    }
}
