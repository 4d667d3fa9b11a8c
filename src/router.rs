// Request routing: one parsed command in, zero or more channel writes out

use crate::auth::CredentialStore;
use crate::protocol::{
    self, Command, ALREADY_LOGGED_IN, LOGIN_INCORRECT, LOGIN_OK, SERVER_FULL,
};
use crate::registry::{outbound_channel_name, LoginOutcome, SessionRegistry};
use crate::transport::SharedTransport;

/// Dispatches commands against the registry and credential store.
///
/// The router holds no state of its own; every request is handled to
/// completion (including outbound writes) before the dispatcher hands
/// it the next one. All per-request failures end here as a reply or a
/// log line, never as an error to the caller.
pub struct Router {
    registry: SessionRegistry,
    credentials: CredentialStore,
    transport: SharedTransport,
}

impl Router {
    pub fn new(
        registry: SessionRegistry,
        credentials: CredentialStore,
        transport: SharedTransport,
    ) -> Self {
        Self {
            registry,
            credentials,
            transport,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handle one command to completion.
    pub async fn handle(&mut self, command: Command) {
        match command {
            Command::Login { username, password } => self.handle_login(&username, &password).await,
            Command::ListOnline { reply } => self.handle_list(&reply).await,
            Command::SendMessage { from, to, body } => {
                self.handle_message(&from, &to, &body).await
            }
            Command::Logout { username } => {
                self.registry.logout(&username).await;
            }
            Command::Malformed { reason } => {
                tracing::warn!("dropping malformed request: {}", reason);
            }
        }
    }

    /// Notify every session and clear the registry. Invoked once by
    /// the dispatcher at termination.
    pub async fn shutdown(&mut self) {
        self.registry.shutdown_all().await;
    }

    async fn handle_login(&mut self, username: &str, password: &str) {
        let authenticated = match self.credentials.verify(username, password) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!("credential store failure: {:#}", e);
                false
            }
        };

        let outcome = if authenticated {
            self.registry.try_login(username, password)
        } else {
            LoginOutcome::BadCredentials
        };

        // Success goes to the channel the session was just bound to;
        // failures go to a transient channel of the same name, opened
        // for this one reply since the user never got registered.
        let reply = match outcome {
            LoginOutcome::Ok => LOGIN_OK,
            LoginOutcome::BadCredentials => {
                tracing::info!("rejected login for {}: bad credentials", username);
                LOGIN_INCORRECT
            }
            LoginOutcome::Full => {
                tracing::info!("rejected login for {}: server full", username);
                SERVER_FULL
            }
            LoginOutcome::AlreadyLoggedIn => {
                tracing::info!("rejected login for {}: already logged in", username);
                ALREADY_LOGGED_IN
            }
        };

        self.reply(&outbound_channel_name(username), reply).await;
    }

    async fn handle_list(&mut self, reply_channel: &str) {
        tracing::info!("sending online users to {}", reply_channel);
        let reply = protocol::list_reply(&self.registry.usernames());
        // The requester created the reply channel; it destroys it too.
        self.reply(reply_channel, &reply).await;
    }

    async fn handle_message(&mut self, from: &str, to: &str, body: &str) {
        // Best-effort delivery: an absent recipient drops the message
        // with no error back to the sender.
        let Some(session) = self.registry.find(to) else {
            tracing::debug!("dropping message from {} to offline user {}", from, to);
            return;
        };
        let channel = session.channel.clone();

        tracing::info!("user {} sent a message to {}", from, to);
        self.reply(&channel, &protocol::delivered_message(from, body))
            .await;
    }

    /// Write one reply line; failures are logged and swallowed so a
    /// vanished requester can never take the dispatcher down.
    async fn reply(&self, channel: &str, line: &str) {
        match self.transport.open_writer(channel).await {
            Ok(mut writer) => {
                if let Err(e) = writer.write(line).await {
                    tracing::warn!("failed to write reply to {}: {}", channel, e);
                }
            }
            Err(e) => {
                tracing::warn!("failed to open reply channel {}: {}", channel, e);
            }
        }
    }
}
