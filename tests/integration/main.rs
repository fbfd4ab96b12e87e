//! Trickle integration test harness.
//!
//! Every test runs the real HTTP surface (and, where needed, a relay)
//! on loopback ports inside the test process and talks to it over TCP
//! with an ordinary HTTP client, the way a device would.

mod failures;
mod transfer;

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use trickle_core::ChunkLayout;
use trickle_services::{ChunkSource, FileSource, Pull, SourceError, TransferService};

// ── Harness ───────────────────────────────────────────────────────────────────

/// A running transfer surface.
pub struct Daemon {
    pub base: String,
    pub transfer: TransferService,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

pub async fn spawn_daemon(source: Box<dyn ChunkSource>) -> Result<Daemon> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let transfer = TransferService::new(source);
    let (shutdown, rx) = oneshot::channel::<()>();
    let state = trickle_api::ApiState {
        transfer: transfer.clone(),
    };
    let task = tokio::spawn(trickle_api::serve(listener, state, async move {
        rx.await.ok();
    }));
    Ok(Daemon {
        base,
        transfer,
        shutdown,
        task,
    })
}

impl Daemon {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.context("server task panicked")??;
        self.transfer.shutdown().await;
        Ok(())
    }
}

/// Deterministic test payload of `len` bytes.
pub fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// A fresh path under the system temp dir, unique within this run.
pub fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("trickle-it-{}-{n}-{name}", std::process::id()))
}

pub fn file_source(data: Vec<u8>) -> Box<dyn ChunkSource> {
    Box::new(FileSource::from_reader(Cursor::new(data), ChunkLayout::default()))
}

pub async fn get(client: &reqwest::Client, url: &str) -> Result<(StatusCode, Vec<u8>)> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    Ok((status, resp.bytes().await?.to_vec()))
}

pub async fn put(client: &reqwest::Client, url: &str) -> Result<StatusCode> {
    Ok(client.put(url).body("foobar").send().await?.status())
}

/// Fetch and acknowledge until 404. Returns every chunk body in order.
pub async fn pull_all(client: &reqwest::Client, url: &str) -> Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::new();
    loop {
        let (status, body) = get(client, url).await?;
        match status {
            StatusCode::OK => chunks.push(body),
            StatusCode::NOT_FOUND => return Ok(chunks),
            other => anyhow::bail!("unexpected status {other}: {}", String::from_utf8_lossy(&body)),
        }
        let ack = put(client, url).await?;
        anyhow::ensure!(ack == StatusCode::OK, "acknowledge returned {ack}");
    }
}

/// Returns the given chunks in order, then is exhausted.
pub struct FixedSource {
    chunks: VecDeque<Bytes>,
}

impl FixedSource {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Bytes::from).collect(),
        }
    }
}

impl ChunkSource for FixedSource {
    fn kind(&self) -> &'static str {
        "fixed"
    }

    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Pull, SourceError>> {
        let next = match self.chunks.pop_front() {
            Some(chunk) => Pull::Chunk(chunk),
            None => Pull::Exhausted,
        };
        Box::pin(async move { Ok(next) })
    }
}
