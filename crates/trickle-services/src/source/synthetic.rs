//! Synthetic source — endless random chunks for load and latency testing.

use bytes::BytesMut;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use zerocopy::AsBytes;

use trickle_core::{ChunkHeader, ChunkLayout, HEADER_SIZE};

use super::{ChunkSource, Pull};
use crate::error::SourceError;

pub struct SyntheticSource {
    rng: StdRng,
    layout: ChunkLayout,
    block_no: u32,
}

impl SyntheticSource {
    pub fn new(layout: ChunkLayout) -> Self {
        Self::with_rng(StdRng::from_entropy(), layout)
    }

    /// Deterministic stream, for tests.
    pub fn seeded(seed: u64, layout: ChunkLayout) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), layout)
    }

    fn with_rng(rng: StdRng, layout: ChunkLayout) -> Self {
        Self {
            rng,
            layout,
            block_no: 0,
        }
    }

    fn generate(&mut self) -> Pull {
        let mut buf = BytesMut::zeroed(self.layout.chunk_size());
        buf[..HEADER_SIZE].copy_from_slice(ChunkHeader::new(self.block_no).as_bytes());
        self.rng.fill_bytes(&mut buf[HEADER_SIZE..]);
        self.block_no = self.block_no.wrapping_add(1);
        Pull::Chunk(buf.freeze())
    }
}

impl ChunkSource for SyntheticSource {
    fn kind(&self) -> &'static str {
        "synthetic"
    }

    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Pull, SourceError>> {
        let pull = self.generate();
        Box::pin(async move { Ok(pull) })
    }
}
