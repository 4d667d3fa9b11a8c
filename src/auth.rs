// Flat-file credential store
//
// The store is a text file of alternating username/password lines:
// append-only for registration, read-only for verification. It is an
// external collaborator from the broker's point of view; the router
// only consumes `verify`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Username/password store backed by one flat file.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a username/password pair against the file.
    ///
    /// A missing file means no valid credentials exist yet, so every
    /// attempt fails; that is not an error.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read credential file {:?}", self.path)
                })
            }
        };

        let mut lines = contents.lines();
        while let Some(stored_user) = lines.next() {
            let Some(stored_password) = lines.next() else {
                tracing::warn!(
                    "credential file {:?} has a dangling username entry",
                    self.path
                );
                break;
            };
            if stored_user == username && stored_password == password {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Append a username/password pair. Registration never rewrites
    /// existing entries.
    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        anyhow::ensure!(!username.is_empty(), "username must not be empty");
        anyhow::ensure!(!password.is_empty(), "password must not be empty");
        anyhow::ensure!(
            !username.contains('\n') && !password.contains('\n'),
            "credentials must be single lines"
        );

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {:?}", parent))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open credential file {:?}", self.path))?;

        writeln!(file, "{username}")?;
        writeln!(file, "{password}")?;
        Ok(())
    }
}
