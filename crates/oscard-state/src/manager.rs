//! Session registry and fan-out.
//!
//! The manager keys sessions by id under a reader-writer lock. Fan-out
//! clones a snapshot of the participants under a short read lock and then
//! delivers without holding anything, so a slow consumer can never stall
//! the registry; the bounded mailbox wait detects it instead, and the
//! manager ejects it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use oscard_types::ScreenName;
use oscard_wire::snac::SnacMessage;

use crate::session::{SendResult, Session, SessionConfig};

/// Keyed registry of live sessions.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionManager {
    /// A manager whose sessions use `config`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session.
    ///
    /// Single-login invariant: any existing session with the same screen
    /// name (case-insensitive) is closed and evicted first.
    pub fn new_session(&self, id: impl Into<String>, screen_name: ScreenName) -> Arc<Session> {
        let session = Arc::new(Session::new(id, screen_name, &self.config));

        let evicted = {
            let Ok(mut sessions) = self.sessions.write() else {
                return session;
            };
            let old_id = sessions
                .values()
                .find(|s| s.screen_name() == session.screen_name())
                .map(|s| s.id().to_string());
            let old = old_id.and_then(|id| sessions.remove(&id));
            sessions.insert(session.id().to_string(), session.clone());
            old
        };

        if let Some(old) = evicted {
            debug!(screen_name = %old.screen_name(), "evicting replaced session");
            old.close();
        }
        session
    }

    /// Look up a session by id.
    pub fn retrieve(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().ok()?.get(id).cloned()
    }

    /// Look up the unique session for a screen name, if any.
    pub fn retrieve_by_screen_name(&self, name: &ScreenName) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .ok()?
            .values()
            .find(|s| s.screen_name() == name)
            .cloned()
    }

    /// Remove a session from the registry. The session is not closed here;
    /// callers close it when the connection dies.
    pub fn remove(&self, session: &Session) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(session.id());
        }
    }

    /// Snapshot of every registered session.
    pub fn participants(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True when no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().map(|s| s.is_empty()).unwrap_or(true)
    }

    /// Deliver to every session.
    pub async fn broadcast(&self, msg: &SnacMessage) {
        for session in self.participants() {
            self.deliver(&session, msg.clone()).await;
        }
    }

    /// Deliver to every session except `exclude`.
    pub async fn broadcast_except(&self, exclude: &Session, msg: &SnacMessage) {
        for session in self.participants() {
            if session.id() != exclude.id() {
                self.deliver(&session, msg.clone()).await;
            }
        }
    }

    /// Deliver to each named session that is registered.
    pub async fn broadcast_to_screen_names(&self, names: &[ScreenName], msg: &SnacMessage) {
        for name in names {
            if let Some(session) = self.retrieve_by_screen_name(name) {
                self.deliver(&session, msg.clone()).await;
            }
        }
    }

    /// Deliver to one named session, if registered.
    pub async fn send_to_screen_name(&self, name: &ScreenName, msg: SnacMessage) {
        if let Some(session) = self.retrieve_by_screen_name(name) {
            self.deliver(&session, msg).await;
        }
    }

    /// Enqueue with the slow-consumer policy: a full mailbox closes and
    /// evicts the session, a closed one is skipped.
    pub async fn deliver(&self, session: &Arc<Session>, msg: SnacMessage) {
        match session.send_message(msg).await {
            SendResult::Sent => {}
            SendResult::QueueFull => {
                warn!(
                    screen_name = %session.screen_name(),
                    "mailbox full, ejecting slow consumer"
                );
                session.close();
                self.remove(session);
            }
            SendResult::Closed => {
                debug!(
                    screen_name = %session.screen_name(),
                    "dropping delivery to closed session"
                );
            }
        }
    }
}
