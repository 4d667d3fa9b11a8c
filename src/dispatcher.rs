// Serial dispatch loop over the shared inbound channel

use crate::protocol::Command;
use crate::router::Router;
use crate::transport::SharedTransport;
use anyhow::{Context, Result};
use tokio::sync::mpsc;

/// Handle for stopping a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl DispatcherHandle {
    /// Request a cooperative shutdown. The loop drains no further
    /// input and notifies every live session before exiting.
    pub fn shutdown(&self) -> Result<()> {
        self.tx.send(()).context("dispatcher already stopped")
    }
}

/// The broker's single logical worker.
///
/// Reads one line at a time from the inbound channel and hands it to
/// the router; each request completes fully, outbound writes included,
/// before the next line is read. That serialization is the ordering
/// guarantee, and it is why the registry needs no locking.
pub struct Dispatcher {
    transport: SharedTransport,
    router: Router,
    inbound: String,
    rx: mpsc::UnboundedReceiver<()>,
}

impl Dispatcher {
    pub fn new(transport: SharedTransport, router: Router, inbound: &str) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                transport,
                router,
                inbound: inbound.to_string(),
                rx,
            },
            DispatcherHandle { tx },
        )
    }

    /// Run until shutdown is requested or the inbound channel ends.
    ///
    /// Failure to create or open the inbound channel is the one fatal
    /// resource error; everything after that is handled per-request.
    pub async fn run(mut self) -> Result<()> {
        self.transport
            .create(&self.inbound)
            .await
            .with_context(|| format!("failed to create inbound channel {:?}", self.inbound))?;
        let mut reader = self
            .transport
            .open_reader(&self.inbound)
            .await
            .with_context(|| format!("failed to open inbound channel {:?}", self.inbound))?;

        tracing::info!("dispatcher listening on {:?}", self.inbound);

        loop {
            tokio::select! {
                line = reader.read_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if line.is_empty() {
                                continue;
                            }
                            self.router.handle(Command::parse(&line)).await;
                        }
                        Ok(None) => {
                            tracing::info!("inbound channel ended");
                            break;
                        }
                        Err(e) => {
                            // A bad read is logged and skipped; only
                            // the open above is allowed to be fatal.
                            tracing::error!("inbound read failed: {}", e);
                        }
                    }
                }
                _ = self.rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        self.router.shutdown().await;
        drop(reader);
        self.transport
            .destroy(&self.inbound)
            .await
            .with_context(|| format!("failed to remove inbound channel {:?}", self.inbound))?;

        tracing::info!("dispatcher stopped");
        Ok(())
    }
}
