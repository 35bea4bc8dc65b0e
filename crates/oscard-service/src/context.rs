//! Shared handler state.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use oscard_state::{ChatRegistry, SessionManager};

/// Everything a food-group handler needs: the BOS session registry, the
/// chat-room registry, the store connection, and the redirect endpoints.
pub struct ServerContext {
    /// BOS session registry.
    pub sessions: Arc<SessionManager>,
    /// Chat-room registry.
    pub chat_rooms: Arc<ChatRegistry>,
    /// Store connection. Handlers lock, query, and release before any
    /// fan-out.
    pub db: Arc<Mutex<Connection>>,
    /// Host string used in redirect TLVs.
    pub host: String,
    /// BOS listener port, for auth redirects.
    pub bos_port: u16,
    /// Chat listener port, for chat redirects.
    pub chat_port: u16,
}

impl ServerContext {
    /// The `host:port` string for BOS redirects.
    pub fn bos_address(&self) -> String {
        format!("{}:{}", self.host, self.bos_port)
    }

    /// The `host:port` string for chat redirects.
    pub fn chat_address(&self) -> String {
        format!("{}:{}", self.host, self.chat_port)
    }
}
