//! pipetalk - messaging rendezvous broker over named channels
//!
//! Clients authenticate against a flat credential file, discover who
//! else is online, and exchange short text messages through a central
//! broker. Requests arrive as protocol lines on one shared inbound
//! channel; replies and messages are pushed to per-user outbound
//! channels. The production transport is filesystem FIFOs under a
//! runtime directory; tests run on an in-memory transport with the
//! same semantics.

pub mod auth;
pub mod cli;
pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod fifo;
pub mod memory;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod state;
pub mod transport;

pub use auth::CredentialStore;
pub use cli::{Cli, CliCommand, DEFAULT_INBOUND};
pub use commands::execute_command;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use fifo::FifoTransport;
pub use memory::MemoryTransport;
pub use protocol::Command;
pub use registry::{LoginOutcome, Session, SessionRegistry, DEFAULT_CAPACITY};
pub use router::Router;
pub use state::{InstanceLock, ServerState};
pub use transport::{LineReader, LineWriter, SharedTransport, Transport, TransportError};
