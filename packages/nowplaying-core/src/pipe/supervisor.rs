//! Open/read/retry loop around the pipe decoder.
//!
//! The loop is driven by [`PipeState`], whose transitions are a pure
//! function of the current state and a [`PipeSignal`]. The pipe is reopened
//! forever after a fixed delay; each attempt starts with an empty decoder.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::pipe::decoder::{PipeDecoder, PipeEvent};

/// Lifecycle state of the pipe reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    Closed,
    Opening,
    Reading,
    Backoff,
}

/// Inputs that move the reader between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeSignal {
    Start,
    Opened,
    OpenFailed,
    Data,
    EndOfStream,
    ReadFailed,
    BackoffElapsed,
    Cancel,
}

impl PipeState {
    /// Next state after `signal`. Signals that do not apply leave the state as is.
    #[must_use]
    pub fn on(self, signal: PipeSignal) -> PipeState {
        use PipeSignal::*;
        use PipeState::*;

        match (self, signal) {
            (_, Cancel) => Closed,
            (Closed, Start) => Opening,
            (Opening, Opened) => Reading,
            (Opening, OpenFailed) => Backoff,
            (Reading, Data) => Reading,
            (Reading, EndOfStream | ReadFailed) => Backoff,
            (Backoff, BackoffElapsed) => Opening,
            (state, _) => state,
        }
    }
}

/// Opens the byte source behind the pipe.
#[async_trait]
pub trait PipeOpener: Send + Sync {
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Opens a named pipe on disk.
///
/// On unix the FIFO is opened non-blocking and read through the reactor, so
/// neither a missing writer nor an idle pipe ties up a runtime thread.
#[derive(Debug, Clone)]
pub struct FifoOpener {
    path: PathBuf,
}

impl FifoOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PipeOpener for FifoOpener {
    #[cfg(unix)]
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        // A FIFO without a writer opens at once and reads end-of-stream
        let receiver = tokio::net::unix::pipe::OpenOptions::new().open_receiver(&self.path)?;
        Ok(Box::new(receiver))
    }

    #[cfg(not(unix))]
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Receives decoded pipe events in stream order.
#[async_trait]
pub trait PipeEventHandler: Send + Sync {
    async fn handle(&self, event: PipeEvent);
}

/// Drives a [`PipeDecoder`] over a reopenable source.
pub struct PipeSupervisor<O: PipeOpener> {
    opener: O,
    decoder: PipeDecoder,
    retry_delay: Duration,
    read_chunk: usize,
}

impl<O: PipeOpener> PipeSupervisor<O> {
    pub fn new(opener: O, retry_delay: Duration, read_chunk: usize) -> Self {
        Self {
            opener,
            decoder: PipeDecoder::new(),
            retry_delay,
            read_chunk: read_chunk.max(1),
        }
    }

    /// Runs until `cancel` fires, passing every decoded event to `handler`.
    pub async fn run(mut self, handler: &dyn PipeEventHandler, cancel: CancellationToken) {
        let name = self.opener.describe();
        let mut buf = vec![0u8; self.read_chunk];
        let mut reader: Option<Box<dyn AsyncRead + Unpin + Send>> = None;
        let mut state = PipeState::Closed.on(PipeSignal::Start);

        while state != PipeState::Closed {
            let signal = match state {
                PipeState::Opening => {
                    self.decoder.reset();
                    log::info!("[Pipe] Opening {}", name);
                    tokio::select! {
                        _ = cancel.cancelled() => PipeSignal::Cancel,
                        opened = self.opener.open() => match opened {
                            Ok(source) => {
                                log::info!("[Pipe] Reading {}", name);
                                reader = Some(source);
                                PipeSignal::Opened
                            }
                            Err(e) => {
                                log::warn!("[Pipe] Failed to open {}: {}", name, e);
                                PipeSignal::OpenFailed
                            }
                        },
                    }
                }
                PipeState::Reading => match reader.as_mut() {
                    Some(source) => {
                        let read = tokio::select! {
                            _ = cancel.cancelled() => None,
                            read = source.read(&mut buf) => Some(read),
                        };
                        match read {
                            None => PipeSignal::Cancel,
                            Some(Ok(0)) => {
                                log::info!("[Pipe] {} closed", name);
                                PipeSignal::EndOfStream
                            }
                            Some(Ok(n)) => {
                                for event in self.decoder.feed(&buf[..n]) {
                                    handler.handle(event).await;
                                }
                                PipeSignal::Data
                            }
                            Some(Err(e)) => {
                                log::warn!("[Pipe] Read error on {}: {}", name, e);
                                PipeSignal::ReadFailed
                            }
                        }
                    }
                    None => PipeSignal::ReadFailed,
                },
                PipeState::Backoff => {
                    reader = None;
                    log::info!("[Pipe] Retrying {} in {:?}", name, self.retry_delay);
                    tokio::select! {
                        _ = cancel.cancelled() => PipeSignal::Cancel,
                        _ = tokio::time::sleep(self.retry_delay) => PipeSignal::BackoffElapsed,
                    }
                }
                PipeState::Closed => PipeSignal::Cancel,
            };
            state = state.on(signal);
        }

        log::info!("[Pipe] Reader for {} stopped", name);
    }
}
