//! Configuration system for Trickle.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TRICKLE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/trickle/config.toml
//!   3. ~/.config/trickle/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chunk::{ChunkLayout, LayoutError, DEFAULT_CHUNK_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrickleConfig {
    pub server: ServerConfig,
    pub chunk: ChunkConfig,
    pub source: SourceConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP surface binds to.
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Total bytes per chunk, including the 256-byte header.
    pub chunk_size: usize,
}

/// Where chunk bytes come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Read a local file.
    #[default]
    File,
    /// Random bytes, never exhausted. For load testing.
    Synthetic,
    /// Ask a relay process over the framed side channel.
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// File served by the file source.
    pub path: PathBuf,
    /// Relay address used by the relay source.
    pub relay_addr: String,
    /// Upper bound on one relay round trip, connect included.
    pub relay_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay process listens on.
    pub listen: String,
    /// How long a relay client may stay silent before it is dropped.
    pub idle_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8888".to_string(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            path: PathBuf::from("example.bin"),
            relay_addr: "127.0.0.1:5000".to_string(),
            relay_timeout_ms: 3000,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:5000".to_string(),
            idle_timeout_ms: 30_000,
        }
    }
}

impl ChunkConfig {
    pub fn layout(&self) -> Result<ChunkLayout, ConfigError> {
        ChunkLayout::new(self.chunk_size).map_err(ConfigError::InvalidLayout)
    }
}

impl SourceConfig {
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

impl RelayConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("trickle")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid chunk layout: {0}")]
    InvalidLayout(LayoutError),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TrickleConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            TrickleConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.chunk.layout()?;
        Ok(config)
    }

    /// Parse a config file without env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TRICKLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TrickleConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TRICKLE_* overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TRICKLE_SERVER__LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = lookup("TRICKLE_CHUNK__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.chunk.chunk_size = n;
            }
        }
        if let Some(v) = lookup("TRICKLE_SOURCE__KIND") {
            match v.to_ascii_lowercase().as_str() {
                "file" => self.source.kind = SourceKind::File,
                "synthetic" => self.source.kind = SourceKind::Synthetic,
                "relay" => self.source.kind = SourceKind::Relay,
                _ => {}
            }
        }
        if let Some(v) = lookup("TRICKLE_SOURCE__PATH") {
            self.source.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TRICKLE_SOURCE__RELAY_ADDR") {
            self.source.relay_addr = v;
        }
        if let Some(v) = lookup("TRICKLE_SOURCE__RELAY_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.source.relay_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("TRICKLE_RELAY__LISTEN") {
            self.relay.listen = v;
        }
        if let Some(v) = lookup("TRICKLE_RELAY__IDLE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.relay.idle_timeout_ms = ms;
            }
        }
    }
}
