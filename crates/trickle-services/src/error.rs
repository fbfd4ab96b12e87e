//! Error taxonomy for transfers.

use std::time::Duration;

use trickle_core::FrameError;

/// Failure talking to the underlying stream or relay.
///
/// Never a synonym for exhaustion: a source that cannot answer returns one
/// of these, a source with nothing left returns `Pull::Exhausted`.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Local read failed.
    #[error("source I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("relay at {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        source: std::io::Error,
    },

    #[error("relay did not answer within {0:?}")]
    Timeout(Duration),

    #[error("relay protocol violation: {message}")]
    Protocol { message: String },

    #[error("relay framing error: {0}")]
    Frame(#[from] FrameError),
}

impl SourceError {
    /// True when the failure sits on the far side of the relay link.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, SourceError::Io(_))
    }
}

/// Outcome of a fetch or acknowledge that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("missing transaction id")]
    MissingId,

    #[error("invalid transaction id")]
    InvalidId,

    /// A different transaction holds the registry.
    #[error("another transaction is active")]
    Conflict { active: String },

    /// Acknowledge for an id that has no live transaction.
    #[error("transaction {id} is not active")]
    NotActive { id: String },

    /// The source is exhausted. Terminal, not a fault.
    #[error("no more data")]
    EndOfData,

    #[error(transparent)]
    Source(#[from] SourceError),
}
