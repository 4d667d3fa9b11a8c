// Command handler wiring CLI subcommands to the broker and client

use crate::auth::CredentialStore;
use crate::cli::{Cli, CliCommand, DEFAULT_INBOUND};
use crate::dispatcher::Dispatcher;
use crate::fifo::FifoTransport;
use crate::registry::SessionRegistry;
use crate::router::Router;
use crate::state::{InstanceLock, ServerState};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Execute one CLI command.
pub async fn execute_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Serve {
            capacity,
            dir,
            credentials,
        } => handle_serve(capacity, dir, credentials).await,
        CliCommand::Register {
            username,
            dir,
            credentials,
        } => handle_register(&username, dir, credentials).await,
        CliCommand::Connect { username, dir } => handle_connect(&username, dir).await,
    }
}

fn credentials_path(dir: &std::path::Path, credentials: Option<PathBuf>) -> PathBuf {
    credentials.unwrap_or_else(|| dir.join("login"))
}

async fn handle_serve(
    capacity: usize,
    dir: Option<PathBuf>,
    credentials: Option<PathBuf>,
) -> Result<()> {
    let dir = Cli::runtime_dir(dir);
    let lock = InstanceLock::acquire(&dir)?;

    let credentials = credentials_path(&dir, credentials);
    let store = CredentialStore::new(&credentials);
    let transport = Arc::new(FifoTransport::new(&dir));

    let registry = SessionRegistry::new(capacity, transport.clone());
    let router = Router::new(registry, store, transport.clone());
    let (dispatcher, handle) = Dispatcher::new(transport, router, DEFAULT_INBOUND);

    ServerState {
        inbound_channel: DEFAULT_INBOUND.to_string(),
        capacity,
        credentials_path: credentials,
        started_at: SystemTime::now(),
        pid: std::process::id(),
    }
    .save(&dir)?;

    println!("Broker running in {:?} (capacity {})", dir, capacity);
    println!("Press Ctrl+C to stop");

    let task = tokio::spawn(dispatcher.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    println!("\nStopping broker...");

    handle.shutdown()?;
    task.await.context("dispatcher task failed")??;

    ServerState::remove(&dir)?;
    drop(lock);
    Ok(())
}

async fn handle_register(
    username: &str,
    dir: Option<PathBuf>,
    credentials: Option<PathBuf>,
) -> Result<()> {
    let dir = Cli::runtime_dir(dir);
    let store = CredentialStore::new(credentials_path(&dir, credentials));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let password = crate::client::prompt(&mut stdin, "Password: ").await?;
    let retyped = crate::client::prompt(&mut stdin, "Retype password: ").await?;

    anyhow::ensure!(password == retyped, "passwords are different");

    store.register(username, &password)?;
    println!("Registered {} in {:?}", username, store.path());
    Ok(())
}

async fn handle_connect(username: &str, dir: Option<PathBuf>) -> Result<()> {
    let dir = Cli::runtime_dir(dir);
    anyhow::ensure!(
        dir.is_dir(),
        "runtime directory {:?} does not exist; start the broker first",
        dir
    );
    let transport = Arc::new(FifoTransport::new(&dir));
    crate::client::run(transport, username).await
}
