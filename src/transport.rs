// Named-channel transport abstraction

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by transport operations.
///
/// Routing code branches on `NoReader` to implement best-effort
/// delivery; everything else is a real resource failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No channel with that name exists.
    #[error("channel not found: {0}")]
    NotFound(String),
    /// The channel exists but nobody is reading it.
    #[error("no reader on channel: {0}")]
    NoReader(String),
    /// The reading side went away mid-write.
    #[error("channel closed: {0}")]
    Closed(String),
    /// Underlying I/O failure.
    #[error("channel i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A named, one-reader byte-stream channel namespace.
///
/// Channels are visible by name to every process sharing the
/// namespace. The broker uses one well-known inbound channel plus one
/// outbound channel per logged-in user (named after the user) and
/// writes to ephemeral reply channels named by requesters.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create the named channel. Creating an existing channel is a no-op.
    async fn create(&self, name: &str) -> Result<()>;

    /// Open the channel for reading. One reader at a time.
    async fn open_reader(&self, name: &str) -> Result<Box<dyn LineReader>>;

    /// Open the channel for writing one burst of lines.
    ///
    /// Fails with [`TransportError::NoReader`] when nobody is reading;
    /// callers deciding between retry and drop rely on that variant.
    async fn open_writer(&self, name: &str) -> Result<Box<dyn LineWriter>>;

    /// Remove the named channel. Removing an absent channel is a no-op.
    async fn destroy(&self, name: &str) -> Result<()>;
}

/// Reading side of a channel.
#[async_trait]
pub trait LineReader: Send {
    /// Read one line, without its terminator. `None` means the channel
    /// was torn down and no further lines will arrive.
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// Writing side of a channel.
#[async_trait]
pub trait LineWriter: Send {
    /// Write one line. The implementation supplies the terminating
    /// newline; `line` must not contain one.
    async fn write(&mut self, line: &str) -> Result<()>;
}

/// Shared handle to a transport implementation.
pub type SharedTransport = Arc<dyn Transport>;
