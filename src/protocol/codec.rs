//! Multi-part message codec
//!
//! Reading is incremental per part; writing encodes the whole message into
//! one buffer first so a writer task never leaves half a message on the wire.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::constants::{FLAG_MORE, KNOWN_FLAGS, PART_HEADER_SIZE};
use crate::protocol::message::Message;

/// Encode a message into `buf`
///
/// Fails with [`Error::EmptyMessage`] for a message without parts, which
/// cannot be represented on the wire.
pub fn encode_message(msg: &Message, buf: &mut BytesMut) -> Result<()> {
    if msg.is_empty() {
        return Err(Error::EmptyMessage);
    }

    buf.reserve(msg.len() * PART_HEADER_SIZE + msg.payload_size());

    let last = msg.len() - 1;
    for (i, part) in msg.parts().iter().enumerate() {
        let len = u32::try_from(part.len()).map_err(|_| Error::MessageTooLarge {
            size: part.len(),
            max: u32::MAX as usize,
        })?;

        buf.put_u8(if i < last { FLAG_MORE } else { 0 });
        buf.put_u32(len);
        buf.put_slice(part);
    }

    Ok(())
}

/// Write a complete message
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    encode_message(msg, &mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next complete message
///
/// Returns `Ok(None)` when the peer closes the stream cleanly between
/// messages. EOF in the middle of a message is an error, as is a message
/// whose parts add up to more than `max_size` bytes.
///
/// Not cancel-safe: dropping the future mid-message loses the parts read
/// so far. Run it from a dedicated reader task.
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut msg = Message::default();
    let mut total: usize = 0;

    loop {
        let flags = match reader.read_u8().await {
            Ok(flags) => flags,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && msg.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if flags & !KNOWN_FLAGS != 0 {
            return Err(Error::InvalidFlags(flags));
        }

        let len = reader.read_u32().await? as usize;
        total = total.saturating_add(len);
        if total > max_size {
            return Err(Error::MessageTooLarge {
                size: total,
                max: max_size,
            });
        }

        let mut part = BytesMut::zeroed(len);
        reader.read_exact(&mut part).await?;
        msg.push(part.freeze());

        if flags & FLAG_MORE == 0 {
            return Ok(Some(msg));
        }
    }
}
