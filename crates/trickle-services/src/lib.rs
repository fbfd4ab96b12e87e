//! trickle-services — chunk sources and the acknowledged-transfer state machine.

pub mod error;
pub mod source;
pub mod transaction;
pub mod transfer;

pub use error::{SourceError, TransferError};
pub use source::{from_config, ChunkSource, FileSource, Pull, RelaySource, SyntheticSource};
pub use transaction::{Transaction, TransactionRegistry};
pub use transfer::{TransferService, TransferSnapshot};
