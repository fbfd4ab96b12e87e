//! trickle-core — chunk layout, relay framing, and configuration.
//! All other Trickle crates depend on this one.

pub mod chunk;
pub mod config;
pub mod frame;

pub use chunk::{ChunkHeader, ChunkLayout, HEADER_SIZE};
pub use frame::{Command, Frame, FrameError};
