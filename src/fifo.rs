// Filesystem FIFO transport: the production channel namespace
//
// Every channel is a named pipe under one runtime directory. The
// broker and its clients rendezvous purely through the filesystem;
// nothing else is negotiated.

use crate::transport::{LineReader, LineWriter, Result, Transport, TransportError};
use async_trait::async_trait;
use nix::sys::stat::Mode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::pipe;

/// How long a writer waits for a reader to appear before the write is
/// dropped as best-effort.
const WRITER_RETRY: Duration = Duration::from_millis(25);
const WRITER_ATTEMPTS: u32 = 10;

/// FIFO-backed [`Transport`] rooted at a runtime directory.
pub struct FifoTransport {
    dir: PathBuf,
}

impl FifoTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        // Channel names arrive over the wire; confine them to the
        // runtime directory.
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid channel name: {:?}", name),
            )));
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl Transport for FifoTransport {
    async fn create(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        match nix::unistd::mkfifo(&path, Mode::from_bits_truncate(0o666)) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::EEXIST) => Ok(()),
            Err(e) => Err(TransportError::Io(std::io::Error::from(e))),
        }
    }

    async fn open_reader(&self, name: &str) -> Result<Box<dyn LineReader>> {
        let path = self.path(name)?;
        // read_write keeps a writing descriptor on our own pipe, so
        // the reader never sees EOF when a client closes its end.
        let receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&path)
            .map_err(|e| reader_open_error(name, &path, e))?;
        Ok(Box::new(FifoReader {
            reader: BufReader::new(receiver),
        }))
    }

    async fn open_writer(&self, name: &str) -> Result<Box<dyn LineWriter>> {
        let path = self.path(name)?;
        // Opening the sending side fails with ENXIO until a reader
        // holds the other end; give one a short window to show up.
        let mut attempts = 0;
        loop {
            match pipe::OpenOptions::new().open_sender(&path) {
                Ok(sender) => {
                    return Ok(Box::new(FifoWriter {
                        name: name.to_string(),
                        sender,
                    }))
                }
                Err(e) if e.raw_os_error() == Some(nix::libc::ENXIO) => {
                    attempts += 1;
                    if attempts >= WRITER_ATTEMPTS {
                        return Err(TransportError::NoReader(name.to_string()));
                    }
                    tokio::time::sleep(WRITER_RETRY).await;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(TransportError::NotFound(name.to_string()));
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

fn reader_open_error(name: &str, path: &Path, e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::NotFound {
        TransportError::NotFound(name.to_string())
    } else {
        tracing::error!("failed to open fifo {:?} for reading: {}", path, e);
        TransportError::Io(e)
    }
}

struct FifoReader {
    reader: BufReader<pipe::Receiver>,
}

#[async_trait]
impl LineReader for FifoReader {
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

struct FifoWriter {
    name: String,
    sender: pipe::Sender,
}

#[async_trait]
impl LineWriter for FifoWriter {
    async fn write(&mut self, line: &str) -> Result<()> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.sender
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::BrokenPipe => TransportError::Closed(self.name.clone()),
                _ => TransportError::Io(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fifo_round_trip() {
        let dir = tempdir().unwrap();
        let transport = FifoTransport::new(dir.path());

        transport.create("ch").await.unwrap();
        let mut reader = transport.open_reader("ch").await.unwrap();
        let mut writer = transport.open_writer("ch").await.unwrap();

        writer.write("hello").await.unwrap();
        writer.write("world").await.unwrap();
        drop(writer);

        assert_eq!(reader.read_line().await.unwrap(), Some("hello".to_string()));
        assert_eq!(reader.read_line().await.unwrap(), Some("world".to_string()));

        transport.destroy("ch").await.unwrap();
        assert!(!dir.path().join("ch").exists());
    }

    #[tokio::test]
    async fn test_writer_without_reader_is_rejected() {
        let dir = tempdir().unwrap();
        let transport = FifoTransport::new(dir.path());

        transport.create("ch").await.unwrap();
        assert!(matches!(
            transport.open_writer("ch").await,
            Err(TransportError::NoReader(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_channel() {
        let dir = tempdir().unwrap();
        let transport = FifoTransport::new(dir.path());

        assert!(matches!(
            transport.open_writer("nope").await,
            Err(TransportError::NotFound(_))
        ));
        // Destroying an absent channel is a no-op.
        transport.destroy("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_names_confined_to_dir() {
        let dir = tempdir().unwrap();
        let transport = FifoTransport::new(dir.path());

        for name in ["", ".", "..", "../escape", "a/b"] {
            assert!(transport.create(name).await.is_err());
        }
    }
}
