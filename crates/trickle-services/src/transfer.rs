//! Transfer service — maps fetch and acknowledge onto the registry and the
//! chunk source.
//!
//! A transaction moves through:
//!
//! ```text
//! ABSENT ──fetch──▶ AWAITING_ACK ──ack──▶ ACKED ──fetch──▶ AWAITING_ACK
//!                        │  ▲                  │
//!                        └──┘ fetch (resend)   └──fetch, source exhausted──▶ ABSENT
//! ```
//!
//! Each call runs start to finish under one lock, source pull included,
//! so block numbering and exhaustion stay strictly ordered no matter how
//! many requests race.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::TransferError;
use crate::source::{ChunkSource, Pull};
use crate::transaction::TransactionRegistry;

/// Longest id accepted, in bytes.
pub const MAX_ID_LEN: usize = 128;

struct Inner {
    registry: TransactionRegistry,
    source: Box<dyn ChunkSource>,
}

/// Cheap to clone; every clone shares the same registry and source.
#[derive(Clone)]
pub struct TransferService {
    inner: Arc<Mutex<Inner>>,
    source_kind: &'static str,
}

/// Read-only view of the service, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSnapshot {
    pub source: &'static str,
    pub active: Option<ActiveTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveTransaction {
    pub id: String,
    pub awaiting_ack: bool,
    pub chunks_sent: u64,
    pub age_secs: u64,
    pub last_chunk_bytes: usize,
    /// BLAKE3 of the last chunk, hex.
    pub last_chunk_digest: String,
}

/// What a fetch does, decided before anything is mutated.
enum Step {
    Open,
    Resend(Bytes),
    Advance,
}

fn validate_id(id: &str) -> Result<(), TransferError> {
    if id.trim().is_empty() {
        return Err(TransferError::MissingId);
    }
    if id.len() > MAX_ID_LEN || id.contains('/') {
        return Err(TransferError::InvalidId);
    }
    Ok(())
}

impl TransferService {
    pub fn new(source: Box<dyn ChunkSource>) -> Self {
        let source_kind = source.kind();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                registry: TransactionRegistry::new(),
                source,
            })),
            source_kind,
        }
    }

    /// Hand out the chunk for `id`: a fresh one, or the unacknowledged one again.
    pub async fn fetch(&self, id: &str) -> Result<Bytes, TransferError> {
        validate_id(id)?;
        let mut guard = self.inner.lock().await;
        let Inner { registry, source } = &mut *guard;

        let step = match registry.active() {
            None => Step::Open,
            Some(tx) if tx.id() != id => {
                tracing::debug!(requested = id, active = tx.id(), "fetch rejected, another transaction active");
                return Err(TransferError::Conflict {
                    active: tx.id().to_string(),
                });
            }
            Some(tx) if tx.is_awaiting_ack() => Step::Resend(tx.last_chunk().clone()),
            Some(_) => Step::Advance,
        };

        match step {
            Step::Resend(chunk) => {
                tracing::debug!(id, bytes = chunk.len(), "resending unacknowledged chunk");
                Ok(chunk)
            }
            Step::Open => match source.next_chunk().await? {
                Pull::Chunk(chunk) => {
                    registry.open(id, chunk.clone());
                    tracing::info!(id, bytes = chunk.len(), "transaction opened");
                    Ok(chunk)
                }
                Pull::Exhausted => {
                    tracing::info!(id, "fetch on exhausted source, nothing opened");
                    Err(TransferError::EndOfData)
                }
            },
            Step::Advance => match source.next_chunk().await? {
                Pull::Chunk(chunk) => {
                    if let Some(tx) = registry.get_mut(id) {
                        tx.deliver(chunk.clone());
                        tracing::debug!(id, chunk = tx.chunks_sent(), bytes = chunk.len(), "chunk delivered");
                    }
                    Ok(chunk)
                }
                Pull::Exhausted => {
                    if let Some(tx) = registry.remove() {
                        tracing::info!(
                            id,
                            chunks = tx.chunks_sent(),
                            elapsed_ms = tx.opened_at().elapsed().as_millis() as u64,
                            "transaction complete"
                        );
                    }
                    Err(TransferError::EndOfData)
                }
            },
        }
    }

    /// Confirm receipt of the last chunk for `id`. Duplicates succeed.
    pub async fn acknowledge(&self, id: &str) -> Result<(), TransferError> {
        validate_id(id)?;
        let mut guard = self.inner.lock().await;
        let Some(tx) = guard.registry.get_mut(id) else {
            tracing::debug!(id, "acknowledge for inactive transaction");
            return Err(TransferError::NotActive { id: id.to_string() });
        };
        if tx.acknowledge() {
            tracing::debug!(id, chunk = tx.chunks_sent(), "chunk acknowledged");
        } else {
            tracing::debug!(id, "duplicate acknowledge");
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> TransferSnapshot {
        let guard = self.inner.lock().await;
        let active = guard.registry.active().map(|tx| ActiveTransaction {
            id: tx.id().to_string(),
            awaiting_ack: tx.is_awaiting_ack(),
            chunks_sent: tx.chunks_sent(),
            age_secs: tx.opened_at().elapsed().as_secs(),
            last_chunk_bytes: tx.last_chunk().len(),
            last_chunk_digest: hex::encode(blake3::hash(tx.last_chunk()).as_bytes()),
        });
        TransferSnapshot {
            source: self.source_kind,
            active,
        }
    }

    /// Drop the live transaction, freeing the registry for another id.
    /// The source keeps its position.
    pub async fn abort(&self) -> Option<String> {
        let mut guard = self.inner.lock().await;
        let removed = guard.registry.remove().map(|tx| tx.id().to_string());
        if let Some(id) = &removed {
            tracing::warn!(id = %id, "transaction aborted");
        }
        removed
    }

    /// Close the chunk source. Failures are logged.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Err(e) = guard.source.close().await {
            tracing::warn!(error = %e, "failed to close chunk source");
        }
    }

    pub fn source_kind(&self) -> &'static str {
        self.source_kind
    }
}
