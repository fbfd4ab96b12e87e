//! CLI command modules.

pub mod http;
pub mod pull;
pub mod status;
