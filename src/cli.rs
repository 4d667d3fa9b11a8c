// CLI surface for the broker and its companion client

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Name of the shared inbound channel, as in the original service.
pub const DEFAULT_INBOUND: &str = "serverin";

/// Messaging rendezvous broker over named channels
#[derive(Debug, Parser)]
#[command(name = "pipetalk")]
#[command(about = "Login, presence, and direct messages through a central broker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the broker
    Serve {
        /// Maximum number of concurrent sessions
        #[arg(short, long, default_value_t = crate::registry::DEFAULT_CAPACITY)]
        capacity: usize,

        /// Runtime directory holding the channels and state
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Credential file (defaults to "login" in the runtime directory)
        #[arg(long)]
        credentials: Option<PathBuf>,
    },

    /// Register a user in the credential file
    Register {
        /// Username to add
        username: String,

        /// Runtime directory holding the credential file
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Credential file (defaults to "login" in the runtime directory)
        #[arg(long)]
        credentials: Option<PathBuf>,
    },

    /// Connect interactively as a user
    Connect {
        /// Username to log in as
        username: String,

        /// Runtime directory shared with the broker
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Runtime directory: channels, credential file, state and lock
    /// files all live here.
    pub fn runtime_dir(dir: Option<PathBuf>) -> PathBuf {
        dir.unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".pipetalk")
        })
    }
}
