//! Relay source — pulls chunks from an external process over the framed
//! side channel.
//!
//! One TCP connection is kept open across pulls. Every round trip,
//! connect included, is bounded by the configured timeout. A reply that
//! misses the deadline is not lost: the connection stays up with the
//! command marked in flight, and the next pull collects that reply
//! instead of asking again. Any other failure drops the connection and
//! the next pull dials afresh.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use trickle_core::frame::{self, write_frame};
use trickle_core::{Command, Frame, FrameError};

use super::{ChunkSource, Pull};
use crate::error::SourceError;

const INBOX_CAPACITY: usize = 8 * 1024;

pub struct RelaySource {
    addr: String,
    timeout: Duration,
    link: Option<Link>,
    /// Set once the relay has answered EOF. The relay shuts down after
    /// that, so it is never asked again.
    exhausted: bool,
}

/// Where a connection stands between round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Idle,
    /// A command frame is partly written. Unrecoverable if interrupted.
    Writing,
    /// The command went out and its reply has not been read yet.
    Awaiting(Command),
}

struct Link {
    stream: TcpStream,
    /// Bytes received but not yet decoded into a frame.
    inbox: BytesMut,
    state: LinkState,
}

impl Link {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            inbox: BytesMut::with_capacity(INBOX_CAPACITY),
            state: LinkState::Idle,
        }
    }

    /// Read the next reply. Cancel-safe: partial frames stay in `inbox`.
    async fn read_reply(&mut self) -> Result<Frame, SourceError> {
        loop {
            if let Some(frame) = frame::decode(&mut self.inbox)? {
                return Ok(frame);
            }
            if self.inbox.capacity() == self.inbox.len() {
                self.inbox.reserve(INBOX_CAPACITY);
            }
            if self.stream.read_buf(&mut self.inbox).await.map_err(FrameError::from)? == 0 {
                return Err(SourceError::Protocol {
                    message: "relay closed the connection without replying".to_string(),
                });
            }
        }
    }

    /// Whether the relay hung up (or sent something unasked) while the
    /// link sat idle. Never blocks.
    fn peer_gone(&mut self) -> bool {
        let mut probe = [0u8; 1];
        match self.stream.try_read(&mut probe) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            _ => true,
        }
    }

    /// Survives a timeout only if the command was fully written.
    fn resumable(&self) -> bool {
        matches!(self.state, LinkState::Awaiting(_))
    }
}

impl RelaySource {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            link: None,
            exhausted: false,
        }
    }

    /// Send one command and read one reply, within the timeout.
    async fn exchange(&mut self, command: Command) -> Result<Frame, SourceError> {
        let timeout = self.timeout;
        let result = match tokio::time::timeout(timeout, self.round_trip(command)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(timeout)),
        };
        if let Err(e) = &result {
            let keep = matches!(e, SourceError::Timeout(_))
                && self.link.as_ref().is_some_and(Link::resumable);
            tracing::warn!(
                addr = %self.addr,
                command = command.as_str(),
                error = %e,
                reply_pending = keep,
                "relay exchange failed"
            );
            if !keep {
                self.link = None;
            }
        }
        result
    }

    async fn connect(&self) -> Result<Link, SourceError> {
        let unreachable = |source| SourceError::Unreachable {
            addr: self.addr.clone(),
            source,
        };
        let stream = TcpStream::connect(&self.addr).await.map_err(unreachable)?;
        stream.set_nodelay(true).map_err(unreachable)?;
        tracing::debug!(addr = %self.addr, "connected to relay");
        Ok(Link::new(stream))
    }

    async fn round_trip(&mut self, command: Command) -> Result<Frame, SourceError> {
        if let Some(link) = self.link.as_mut() {
            if link.state == LinkState::Idle && link.peer_gone() {
                tracing::debug!(addr = %self.addr, "relay dropped the idle connection, redialing");
                self.link = None;
            }
        }
        if self.link.is_none() {
            self.link = Some(self.connect().await?);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(SourceError::Protocol {
                message: "relay connection unavailable".to_string(),
            });
        };

        if let LinkState::Awaiting(earlier) = link.state {
            if earlier != command {
                // Settle the reply to an earlier command before asking anything new.
                let stale = link.read_reply().await?;
                link.state = LinkState::Idle;
                tracing::debug!(frame = stale.name(), earlier = earlier.as_str(), "discarded stale relay reply");
                if stale == Frame::Eof {
                    return Ok(Frame::Eof);
                }
            } else {
                tracing::debug!(command = command.as_str(), "collecting late relay reply");
            }
        }

        if link.state == LinkState::Idle {
            link.state = LinkState::Writing;
            write_frame(&mut link.stream, &Frame::from(command)).await?;
            link.state = LinkState::Awaiting(command);
        }
        let reply = link.read_reply().await?;
        link.state = LinkState::Idle;
        Ok(reply)
    }

    async fn pull(&mut self) -> Result<Pull, SourceError> {
        if self.exhausted {
            return Ok(Pull::Exhausted);
        }
        match self.exchange(Command::Send).await? {
            Frame::Chunk(bytes) => Ok(Pull::Chunk(bytes)),
            Frame::Eof => {
                tracing::info!(addr = %self.addr, "relay reported end of data");
                self.exhausted = true;
                self.link = None;
                Ok(Pull::Exhausted)
            }
            Frame::Error(message) => Err(SourceError::Protocol {
                message: format!("relay rejected send: {message}"),
            }),
            other => Err(SourceError::Protocol {
                message: format!("unexpected {} frame in reply to send", other.name()),
            }),
        }
    }

    async fn shutdown(&mut self) -> Result<(), SourceError> {
        if self.exhausted {
            return Ok(());
        }
        match self.exchange(Command::Close).await? {
            // Eof here means the relay finished while a send was in flight.
            Frame::Closed | Frame::Eof => {
                self.exhausted = true;
                self.link = None;
                Ok(())
            }
            other => Err(SourceError::Protocol {
                message: format!("unexpected {} frame in reply to close", other.name()),
            }),
        }
    }
}

impl ChunkSource for RelaySource {
    fn kind(&self) -> &'static str {
        "relay"
    }

    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Pull, SourceError>> {
        Box::pin(self.pull())
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), SourceError>> {
        Box::pin(self.shutdown())
    }
}
