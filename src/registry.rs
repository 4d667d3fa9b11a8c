// Session registry: the set of currently logged-in users

use crate::protocol::{LOGOUT_SENTINEL, SERVER_TERMINATED};
use crate::transport::SharedTransport;

/// Default number of concurrent sessions the broker accepts.
pub const DEFAULT_CAPACITY: usize = 10;

/// One authenticated, connected user.
///
/// Owned exclusively by [`SessionRegistry`]; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unique identifier, doubling as the delivery address.
    pub username: String,
    /// Name of the user's outbound channel, derived from the username.
    pub channel: String,
}

impl Session {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            channel: outbound_channel_name(username),
        }
    }
}

/// Outbound channel name for a user. The mapping is deterministic so
/// the broker and the client agree without negotiation.
pub fn outbound_channel_name(username: &str) -> String {
    username.to_string()
}

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session created and registered.
    Ok,
    /// Username unknown or password wrong (empty fields included).
    BadCredentials,
    /// Registry already holds `capacity` sessions.
    Full,
    /// A session with that username is already live. The existing
    /// session is left untouched; duplicate logins are rejected.
    AlreadyLoggedIn,
}

/// Bounded, insertion-ordered collection of live sessions.
///
/// Touched only by the single dispatcher task, so it needs no
/// interior locking. Backed by a Vec: capacity is small, lookups are
/// by username, and iteration order is insertion order, which is the
/// only ordering the list reply guarantees.
pub struct SessionRegistry {
    sessions: Vec<Session>,
    capacity: usize,
    transport: SharedTransport,
}

impl SessionRegistry {
    pub fn new(capacity: usize, transport: SharedTransport) -> Self {
        Self {
            sessions: Vec::with_capacity(capacity),
            capacity,
            transport,
        }
    }

    /// Register a session for an already-authenticated user.
    ///
    /// Credential checking happens in the router; this enforces the
    /// registry invariants only: capacity and username uniqueness.
    /// Failure paths leave the registry unchanged.
    pub fn try_login(&mut self, username: &str, password: &str) -> LoginOutcome {
        if username.is_empty() || password.is_empty() {
            return LoginOutcome::BadCredentials;
        }
        if self.find(username).is_some() {
            return LoginOutcome::AlreadyLoggedIn;
        }
        if self.sessions.len() >= self.capacity {
            return LoginOutcome::Full;
        }

        self.sessions.push(Session::new(username));
        tracing::info!("user {} logged in", username);
        LoginOutcome::Ok
    }

    /// Remove a session, writing the logout sentinel to its channel as
    /// the last action before the writer is released. Logging out an
    /// absent user is a no-op returning false, with no outbound write.
    pub async fn logout(&mut self, username: &str) -> bool {
        let Some(pos) = self.sessions.iter().position(|s| s.username == username) else {
            return false;
        };
        let session = self.sessions.remove(pos);

        self.notify(&session, &[LOGOUT_SENTINEL]).await;
        tracing::info!("user {} logged out", username);
        true
    }

    /// Snapshot of live usernames in insertion order.
    pub fn usernames(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.username.clone()).collect()
    }

    /// Look up a live session by username.
    pub fn find(&self, username: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.username == username)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Notify and remove every live session. Called once, at server
    /// termination.
    pub async fn shutdown_all(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        for session in &sessions {
            self.notify(session, &[SERVER_TERMINATED, LOGOUT_SENTINEL])
                .await;
            tracing::info!("user {} logged out (shutdown)", session.username);
        }
    }

    /// Best-effort write of one burst of lines to a session's channel.
    /// A client that already went away just loses the notice.
    async fn notify(&self, session: &Session, lines: &[&str]) {
        match self.transport.open_writer(&session.channel).await {
            Ok(mut writer) => {
                for line in lines {
                    if let Err(e) = writer.write(line).await {
                        tracing::warn!(
                            "failed to notify {} on {}: {}",
                            session.username,
                            session.channel,
                            e
                        );
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "failed to open channel {} for {}: {}",
                    session.channel,
                    session.username,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use crate::memory::MemoryTransport;
    use std::sync::Arc;

    fn registry(capacity: usize) -> (SessionRegistry, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        (
            SessionRegistry::new(capacity, transport.clone()),
            transport,
        )
    }

    #[tokio::test]
    async fn test_login_and_list_order() {
        let (mut registry, _transport) = registry(5);

        assert_eq!(registry.try_login("alice", "pw"), LoginOutcome::Ok);
        assert_eq!(registry.try_login("bob", "pw"), LoginOutcome::Ok);

        assert_eq!(registry.usernames(), vec!["alice", "bob"]);
        assert!(registry.find("alice").is_some());
        assert!(registry.find("carol").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let (mut registry, _transport) = registry(5);

        assert_eq!(registry.try_login("alice", "pw"), LoginOutcome::Ok);
        assert_eq!(
            registry.try_login("alice", "pw"),
            LoginOutcome::AlreadyLoggedIn
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let (mut registry, _transport) = registry(2);

        assert_eq!(registry.try_login("alice", "pw"), LoginOutcome::Ok);
        assert_eq!(registry.try_login("bob", "pw"), LoginOutcome::Ok);
        assert_eq!(registry.try_login("carol", "pw"), LoginOutcome::Full);
        assert_eq!(registry.len(), 2);

        // A slot frees up on logout.
        let transport = registry.transport.clone();
        transport.create("alice").await.unwrap();
        let mut reader = transport.open_reader("alice").await.unwrap();
        assert!(registry.logout("alice").await);
        assert_eq!(
            reader.read_line().await.unwrap(),
            Some(LOGOUT_SENTINEL.to_string())
        );

        assert_eq!(registry.try_login("carol", "pw"), LoginOutcome::Ok);
        assert_eq!(registry.usernames(), vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_logout_absent_user_is_noop() {
        let (mut registry, _transport) = registry(2);
        assert!(!registry.logout("nobody").await);
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let (mut registry, _transport) = registry(2);
        assert_eq!(registry.try_login("", "pw"), LoginOutcome::BadCredentials);
        assert_eq!(
            registry.try_login("alice", ""),
            LoginOutcome::BadCredentials
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_all_notifies_everyone() {
        let (mut registry, transport) = registry(5);

        registry.try_login("alice", "pw");
        registry.try_login("bob", "pw");

        transport.create("alice").await.unwrap();
        transport.create("bob").await.unwrap();
        let mut alice = transport.open_reader("alice").await.unwrap();
        let mut bob = transport.open_reader("bob").await.unwrap();

        registry.shutdown_all().await;
        assert!(registry.is_empty());

        for reader in [&mut alice, &mut bob] {
            assert_eq!(
                reader.read_line().await.unwrap(),
                Some(SERVER_TERMINATED.to_string())
            );
            assert_eq!(
                reader.read_line().await.unwrap(),
                Some(LOGOUT_SENTINEL.to_string())
            );
        }
    }
}
