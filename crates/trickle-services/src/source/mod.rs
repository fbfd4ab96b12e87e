//! Chunk sources — where the bytes handed to a client come from.
//!
//! The transfer service holds exactly one source, picked at startup, and
//! calls it only while holding its lock. A source therefore never sees
//! two concurrent pulls.

mod file;
mod relay;
mod synthetic;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::BoxFuture;

use trickle_core::config::{SourceConfig, SourceKind};
use trickle_core::ChunkLayout;

use crate::error::SourceError;

pub use file::FileSource;
pub use relay::RelaySource;
pub use synthetic::SyntheticSource;

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    Chunk(Bytes),
    /// Nothing left. Once returned, every later pull returns it too.
    Exhausted,
}

/// Producer of successive chunks.
pub trait ChunkSource: Send {
    /// Name shown on the status surface.
    fn kind(&self) -> &'static str;

    /// Produce the next chunk, advancing the underlying stream by one.
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Pull, SourceError>>;

    /// Release whatever the source holds open. Called once on shutdown.
    fn close(&mut self) -> BoxFuture<'_, Result<(), SourceError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Build the source named by `config`.
pub async fn from_config(
    config: &SourceConfig,
    layout: ChunkLayout,
) -> Result<Box<dyn ChunkSource>> {
    let source: Box<dyn ChunkSource> = match config.kind {
        SourceKind::File => Box::new(
            FileSource::open(&config.path, layout)
                .await
                .with_context(|| format!("failed to open {}", config.path.display()))?,
        ),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(layout)),
        SourceKind::Relay => Box::new(RelaySource::new(
            config.relay_addr.clone(),
            config.relay_timeout(),
        )),
    };
    tracing::info!(kind = source.kind(), "chunk source ready");
    Ok(source)
}
