//! File-backed source — slices a byte stream into numbered chunks.

use std::io;
use std::path::Path;

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use zerocopy::AsBytes;

use trickle_core::{ChunkHeader, ChunkLayout, HEADER_SIZE};

use super::{ChunkSource, Pull};
use crate::error::SourceError;

pub struct FileSource {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    layout: ChunkLayout,
    /// Counter for the next chunk's header. Wider than the header field
    /// so running past `u32::MAX` is detected rather than wrapped.
    next_block: u64,
    exhausted: bool,
}

impl FileSource {
    pub async fn open(path: &Path, layout: ChunkLayout) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await?;
        tracing::info!(path = %path.display(), payload = layout.payload_size(), "serving file");
        Ok(Self::from_reader(BufReader::new(file), layout))
    }

    pub fn from_reader<R>(reader: R, layout: ChunkLayout) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            layout,
            next_block: 0,
            exhausted: false,
        }
    }

    /// Number of chunks produced so far.
    pub fn blocks_read(&self) -> u64 {
        self.next_block
    }

    async fn read_chunk(&mut self) -> Result<Pull, SourceError> {
        if self.exhausted {
            return Ok(Pull::Exhausted);
        }

        // Checked before reading so a refused pull consumes nothing.
        let block_no = u32::try_from(self.next_block).map_err(|_| {
            SourceError::Io(io::Error::other(
                "stream is longer than the 32-bit block counter can number",
            ))
        })?;

        let mut buf = BytesMut::zeroed(self.layout.chunk_size());
        let filled = fill(&mut self.reader, &mut buf[HEADER_SIZE..]).await?;
        if filled == 0 {
            self.exhausted = true;
            tracing::info!(blocks = self.next_block, "file source exhausted");
            return Ok(Pull::Exhausted);
        }

        buf.truncate(HEADER_SIZE + filled);
        buf[..HEADER_SIZE].copy_from_slice(ChunkHeader::new(block_no).as_bytes());
        tracing::trace!(block_no, payload = filled, "chunk read");

        self.next_block += 1;
        Ok(Pull::Chunk(buf.freeze()))
    }
}

/// Read until `buf` is full or the stream ends. Returns bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl ChunkSource for FileSource {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Pull, SourceError>> {
        Box::pin(self.read_chunk())
    }
}
