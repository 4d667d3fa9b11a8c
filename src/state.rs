// Server state file and single-instance lock

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "pipetalk.lock";

/// Snapshot of a running broker, persisted under the runtime
/// directory for tooling and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerState {
    pub inbound_channel: String,
    pub capacity: usize,
    pub credentials_path: PathBuf,
    pub started_at: SystemTime,
    pub pid: u32,
}

impl ServerState {
    /// Write the state file into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(STATE_FILE);
        let json = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write state file {:?}", path))?;
        Ok(())
    }

    /// Read the state file from `dir`, if a broker has run there.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(STATE_FILE);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read state file {:?}", path))
            }
        };
        let state = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse state file {:?}", path))?;
        Ok(Some(state))
    }

    pub fn remove(dir: &Path) -> Result<()> {
        let path = dir.join(STATE_FILE);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove state file {:?}", path)),
        }
    }
}

/// Guard refusing a second concurrent broker in the same runtime
/// directory. The lock file is removed on drop.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create runtime directory {:?}", dir))?;

        let path = dir.join(LOCK_FILE);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                anyhow::bail!(
                    "another broker is already running in {:?} (remove {:?} if it is stale)",
                    dir,
                    path
                )
            }
            Err(e) => {
                Err(e).with_context(|| format!("failed to create lock file {:?}", path))
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove lock file {:?}: {}", self.path, e);
            }
        }
    }
}
