// In-memory transport over tokio channels, used by the test suites

use crate::transport::{LineReader, LineWriter, Result, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct Entry {
    tx: mpsc::UnboundedSender<String>,
    // Held here until a reader claims it; one reader at a time.
    rx: Option<mpsc::UnboundedReceiver<String>>,
}

/// Named channels backed by unbounded mpsc pairs.
///
/// Semantics mirror the FIFO transport: a writer opened on a channel
/// whose receiving half is gone fails, and a destroyed channel wakes
/// its reader with end-of-stream.
pub struct MemoryTransport {
    channels: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lines currently queued on a channel, drained. Test helper for
    /// asserting exact delivery without holding a reader open.
    pub async fn drain(&self, name: &str) -> Result<Vec<String>> {
        let mut channels = self.channels.lock().await;
        let entry = channels
            .get_mut(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        let rx = entry
            .rx
            .as_mut()
            .ok_or_else(|| TransportError::NoReader(name.to_string()))?;

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        Ok(lines)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn create(&self, name: &str) -> Result<()> {
        let mut channels = self.channels.lock().await;
        channels.entry(name.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            Entry { tx, rx: Some(rx) }
        });
        Ok(())
    }

    async fn open_reader(&self, name: &str) -> Result<Box<dyn LineReader>> {
        let mut channels = self.channels.lock().await;
        let entry = channels
            .get_mut(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        let rx = entry
            .rx
            .take()
            .ok_or_else(|| TransportError::NoReader(name.to_string()))?;
        Ok(Box::new(MemoryReader { rx }))
    }

    async fn open_writer(&self, name: &str) -> Result<Box<dyn LineWriter>> {
        let channels = self.channels.lock().await;
        let entry = channels
            .get(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        if entry.tx.is_closed() {
            return Err(TransportError::NoReader(name.to_string()));
        }
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            tx: entry.tx.clone(),
        }))
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        let mut channels = self.channels.lock().await;
        channels.remove(name);
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl LineReader for MemoryReader {
    async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

struct MemoryWriter {
    name: String,
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl LineWriter for MemoryWriter {
    async fn write(&mut self, line: &str) -> Result<()> {
        self.tx
            .send(line.to_string())
            .map_err(|_| TransportError::Closed(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let transport = MemoryTransport::new();
        transport.create("ch").await.unwrap();

        let mut writer = transport.open_writer("ch").await.unwrap();
        writer.write("hello").await.unwrap();

        let mut reader = transport.open_reader("ch").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_open_missing_channel_fails() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.open_writer("nope").await,
            Err(TransportError::NotFound(_))
        ));
        assert!(matches!(
            transport.open_reader("nope").await,
            Err(TransportError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_single_reader() {
        let transport = MemoryTransport::new();
        transport.create("ch").await.unwrap();

        let _reader = transport.open_reader("ch").await.unwrap();
        assert!(matches!(
            transport.open_reader("ch").await,
            Err(TransportError::NoReader(_))
        ));
    }

    #[tokio::test]
    async fn test_destroy_wakes_reader() {
        let transport = MemoryTransport::new();
        transport.create("ch").await.unwrap();
        let mut reader = transport.open_reader("ch").await.unwrap();

        transport.destroy("ch").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let transport = MemoryTransport::new();
        transport.create("ch").await.unwrap();
        let mut writer = transport.open_writer("ch").await.unwrap();
        writer.write("kept").await.unwrap();

        // Re-creating must not drop the queued line.
        transport.create("ch").await.unwrap();
        assert_eq!(transport.drain("ch").await.unwrap(), vec!["kept"]);
    }
}
