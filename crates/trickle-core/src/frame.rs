//! Relay side-channel framing.
//!
//! The relay source talks to an external chunk-serving process over a
//! plain TCP stream. Every message in either direction is one frame:
//!
//! ```text
//! +------+-------------------+--------------------------+
//! | kind | body_len (u32)    | body (body_len bytes)    |
//! | u8   | big-endian        |                          |
//! +------+-------------------+--------------------------+
//!   1 byte     4 bytes           variable
//! ```
//!
//! Exhaustion is its own frame kind, so chunk bytes are never inspected
//! and a payload that happens to start with `EOF` passes through intact.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Fixed preamble size: kind(1) + body_len(4).
pub const PREAMBLE_LEN: usize = 5;

/// Largest body a frame may carry.
pub const MAX_BODY_LEN: usize = 1024 * 1024;

pub mod kind {
    pub const COMMAND: u8 = 0x01;
    pub const CHUNK: u8 = 0x02;
    pub const EOF: u8 = 0x03;
    pub const CLOSED: u8 = 0x04;
    pub const ERROR: u8 = 0x05;
}

/// One message on the side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Client → relay. Body is the command text, e.g. `send`.
    Command(String),
    /// Relay → client. One chunk, forwarded verbatim.
    Chunk(Bytes),
    /// Relay → client. The stream is exhausted.
    Eof,
    /// Relay → client. Acknowledges `close`.
    Closed,
    /// Relay → client. The command was not understood.
    Error(String),
}

/// Commands a client may send to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Send,
    Close,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Send => "send",
            Command::Close => "close",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "send" => Some(Command::Send),
            "close" => Some(Command::Close),
            _ => None,
        }
    }
}

impl From<Command> for Frame {
    fn from(command: Command) -> Self {
        Frame::Command(command.as_str().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown frame kind {0:#04x}")]
    UnknownKind(u8),
    #[error("frame body of {0} bytes exceeds limit")]
    TooLarge(usize),
    #[error("frame body is not valid UTF-8")]
    InvalidText,
}

impl Frame {
    pub fn kind(&self) -> u8 {
        match self {
            Frame::Command(_) => kind::COMMAND,
            Frame::Chunk(_) => kind::CHUNK,
            Frame::Eof => kind::EOF,
            Frame::Closed => kind::CLOSED,
            Frame::Error(_) => kind::ERROR,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Command(_) => "command",
            Frame::Chunk(_) => "chunk",
            Frame::Eof => "eof",
            Frame::Closed => "closed",
            Frame::Error(_) => "error",
        }
    }

    fn body(&self) -> &[u8] {
        match self {
            Frame::Command(text) | Frame::Error(text) => text.as_bytes(),
            Frame::Chunk(bytes) => bytes,
            Frame::Eof | Frame::Closed => &[],
        }
    }

    /// Serialize into preamble + body.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let body = self.body();
        if body.len() > MAX_BODY_LEN {
            return Err(FrameError::TooLarge(body.len()));
        }
        let mut buf = BytesMut::with_capacity(PREAMBLE_LEN + body.len());
        buf.put_u8(self.kind());
        buf.put_u32(body.len() as u32);
        buf.put_slice(body);
        Ok(buf.freeze())
    }

    fn from_parts(kind: u8, body: Bytes) -> Result<Self, FrameError> {
        let text = |body: Bytes| {
            std::str::from_utf8(&body)
                .map(str::to_owned)
                .map_err(|_| FrameError::InvalidText)
        };
        match kind {
            kind::COMMAND => Ok(Frame::Command(text(body)?)),
            kind::CHUNK => Ok(Frame::Chunk(body)),
            kind::EOF => Ok(Frame::Eof),
            kind::CLOSED => Ok(Frame::Closed),
            kind::ERROR => Ok(Frame::Error(text(body)?)),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// Take one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched until the whole frame
/// has arrived. Unlike [`read_frame`], a caller that buffers reads this
/// way can abandon a read halfway (on a timeout, say) and resume later
/// without losing its place in the stream.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
    if buf.len() < PREAMBLE_LEN {
        return Ok(None);
    }
    let kind = buf[0];
    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if len > MAX_BODY_LEN {
        return Err(FrameError::TooLarge(len));
    }
    if buf.len() < PREAMBLE_LEN + len {
        buf.reserve(PREAMBLE_LEN + len - buf.len());
        return Ok(None);
    }
    buf.advance(PREAMBLE_LEN);
    let body = buf.split_to(len).freeze();
    Frame::from_parts(kind, body).map(Some)
}

/// Write one frame and flush.
pub async fn write_frame<W>(stream: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = frame.encode()?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;
    Ok(())
}

/// Read exactly one frame.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly before the
/// first byte of a frame. A close mid-frame is an I/O error.
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut kind = [0u8; 1];
    if stream.read(&mut kind).await? == 0 {
        return Ok(None);
    }

    let len = stream.read_u32().await? as usize;
    if len > MAX_BODY_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Frame::from_parts(kind[0], Bytes::from(body)).map(Some)
}
