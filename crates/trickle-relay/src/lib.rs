//! trickle-relay — serves chunks to a relay source over the framed side
//! channel.
//!
//! One relay process serves one stream. Connections are handled one at a
//! time and each may carry any number of commands. A connection that
//! stays silent longer than the idle timeout is dropped so it cannot hold
//! the relay. Once the stream is exhausted and EOF has been delivered, or
//! a client sends `close`, the relay stops for good.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use trickle_core::frame::{read_frame, write_frame};
use trickle_core::{Command, Frame, FrameError};
use trickle_services::{ChunkSource, Pull};

/// Default bound on how long a connection may sit between commands.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RelayServer {
    listener: TcpListener,
    source: Box<dyn ChunkSource>,
    idle_timeout: Duration,
}

/// How a connection ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Client hung up or went idle; wait for the next one.
    Disconnected,
    /// EOF delivered or close requested; stop serving.
    Finished,
}

impl RelayServer {
    pub fn new(listener: TcpListener, source: Box<dyn ChunkSource>) -> Self {
        Self {
            listener,
            source,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the stream is finished.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until the stream is finished or `shutdown` resolves. On
    /// shutdown the source is closed before returning.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tracing::info!(
            addr = %self.listener.local_addr()?,
            source = self.source.kind(),
            idle_timeout_ms = self.idle_timeout.as_millis() as u64,
            "relay listening"
        );
        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => break,
            };
            tracing::info!(%peer, "relay client connected");
            let served = tokio::select! {
                served = self.serve_connection(stream) => served,
                _ = &mut shutdown => break,
            };
            match served {
                Ok(Outcome::Finished) => {
                    tracing::info!("relay finished");
                    return Ok(());
                }
                Ok(Outcome::Disconnected) => {
                    tracing::info!(%peer, "relay client disconnected");
                }
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "relay connection failed");
                }
            }
        }

        tracing::info!("relay shutting down");
        if let Err(e) = self.source.close().await {
            tracing::warn!(error = %e, "failed to close chunk source");
        }
        Ok(())
    }

    async fn serve_connection(&mut self, mut stream: TcpStream) -> Result<Outcome, FrameError> {
        stream.set_nodelay(true)?;
        loop {
            let frame = match tokio::time::timeout(self.idle_timeout, read_frame(&mut stream)).await {
                Ok(frame) => frame?,
                Err(_) => {
                    tracing::info!(idle_timeout_ms = self.idle_timeout.as_millis() as u64, "dropping idle relay client");
                    return Ok(Outcome::Disconnected);
                }
            };
            let Some(frame) = frame else {
                return Ok(Outcome::Disconnected);
            };
            let (reply, outcome) = self.answer(frame).await;
            write_frame(&mut stream, &reply).await?;
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }

    /// Reply to one frame, plus the connection outcome if it ends the session.
    async fn answer(&mut self, frame: Frame) -> (Frame, Option<Outcome>) {
        let text = match frame {
            Frame::Command(text) => text,
            other => {
                return (
                    Frame::Error(format!("unexpected {} frame", other.name())),
                    None,
                )
            }
        };

        match Command::parse(&text) {
            Some(Command::Send) => match self.source.next_chunk().await {
                Ok(Pull::Chunk(chunk)) => (Frame::Chunk(chunk), None),
                Ok(Pull::Exhausted) => {
                    tracing::info!("stream exhausted, sending EOF");
                    (Frame::Eof, Some(Outcome::Finished))
                }
                Err(e) => {
                    tracing::error!(error = %e, "chunk source failed");
                    (Frame::Error(e.to_string()), None)
                }
            },
            Some(Command::Close) => {
                if let Err(e) = self.source.close().await {
                    tracing::warn!(error = %e, "failed to close chunk source");
                }
                tracing::info!("close requested");
                (Frame::Closed, Some(Outcome::Finished))
            }
            None => {
                tracing::warn!(command = %text, "unknown relay command");
                (Frame::Error("unknown command".to_string()), None)
            }
        }
    }
}
