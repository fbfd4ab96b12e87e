//! Transactions — the server-side record of one client's pull.

use std::time::Instant;

use bytes::Bytes;

/// One logical transfer, keyed by a caller-chosen id.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: String,
    /// Most recently delivered chunk. Replaced on advance, never edited.
    last_chunk: Bytes,
    awaiting_ack: bool,
    chunks_sent: u64,
    opened_at: Instant,
}

impl Transaction {
    /// A transaction that has just delivered its first chunk.
    fn open(id: String, chunk: Bytes) -> Self {
        Self {
            id,
            last_chunk: chunk,
            awaiting_ack: true,
            chunks_sent: 1,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_chunk(&self) -> &Bytes {
        &self.last_chunk
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Distinct chunks delivered, resends not counted.
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Record delivery of the next chunk.
    pub fn deliver(&mut self, chunk: Bytes) {
        self.last_chunk = chunk;
        self.awaiting_ack = true;
        self.chunks_sent += 1;
    }

    /// Clear the awaiting flag. Returns false if it was already clear.
    pub fn acknowledge(&mut self) -> bool {
        std::mem::replace(&mut self.awaiting_ack, false)
    }
}

/// Holds at most one live transaction.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    active: Option<Transaction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn active(&self) -> Option<&Transaction> {
        self.active.as_ref()
    }

    /// The live transaction, if it has this id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.active.as_mut().filter(|tx| tx.id == id)
    }

    /// Start a transaction with its first chunk.
    ///
    /// Callers check `is_empty` first. Opening over a live transaction
    /// replaces it, which the transfer service never does.
    pub fn open(&mut self, id: &str, chunk: Bytes) -> &Transaction {
        debug_assert!(self.active.is_none(), "registry holds at most one transaction");
        self.active.insert(Transaction::open(id.to_string(), chunk))
    }

    /// Drop the live transaction, returning it.
    pub fn remove(&mut self) -> Option<Transaction> {
        self.active.take()
    }
}
