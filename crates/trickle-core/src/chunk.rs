//! Chunk layout — the unit handed to a client on every fetch.
//!
//! A chunk is a fixed 256-byte header followed by a payload segment:
//!
//! ```text
//! +----------------+----------------+-------------------------------+
//! | block_no (u32) | zero fill      | payload (<= payload_size)     |
//! | big-endian     | 252 bytes      |                               |
//! +----------------+----------------+-------------------------------+
//! ```
//!
//! Every chunk except the last carries a full payload. Clients locate the
//! payload by skipping `HEADER_SIZE` bytes; the payload length is whatever
//! remains of the body.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::frame::MAX_BODY_LEN;

/// Wire size of [`ChunkHeader`].
pub const HEADER_SIZE: usize = 256;

/// Default total chunk size (header + payload).
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Metadata header prefixed to every chunk.
///
/// Only the block counter is defined. The remaining bytes are reserved
/// and always zero.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct ChunkHeader {
    /// Position of this chunk in the stream, starting at 0.
    pub block_no: U32<BigEndian>,
    /// Reserved, must be zero.
    pub reserved: [u8; HEADER_SIZE - 4],
}

assert_eq_size!(ChunkHeader, [u8; HEADER_SIZE]);

impl ChunkHeader {
    pub fn new(block_no: u32) -> Self {
        let mut header = Self::new_zeroed();
        header.block_no.set(block_no);
        header
    }

    /// Parse the header at the front of a chunk. None if the chunk is too short.
    pub fn parse(chunk: &[u8]) -> Option<Self> {
        Self::read_from_prefix(chunk)
    }
}

/// Block counter of a chunk, if it is long enough to carry a header.
pub fn block_no(chunk: &[u8]) -> Option<u32> {
    ChunkHeader::parse(chunk).map(|h| h.block_no.get())
}

/// Payload bytes of a chunk (everything after the header).
pub fn payload(chunk: &[u8]) -> &[u8] {
    chunk.get(HEADER_SIZE..).unwrap_or(&[])
}

/// Size parameters shared by every chunk source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("chunk size {0} leaves no room for payload after the 256-byte header")]
    TooSmall(usize),
    #[error("chunk size {0} exceeds the 1 MiB frame limit")]
    TooLarge(usize),
}

impl ChunkLayout {
    pub fn new(chunk_size: usize) -> Result<Self, LayoutError> {
        if chunk_size <= HEADER_SIZE {
            return Err(LayoutError::TooSmall(chunk_size));
        }
        if chunk_size > MAX_BODY_LEN {
            return Err(LayoutError::TooLarge(chunk_size));
        }
        Ok(Self { chunk_size })
    }

    /// Header + payload.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn payload_size(&self) -> usize {
        self.chunk_size - HEADER_SIZE
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
