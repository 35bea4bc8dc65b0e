//! # oscard-service
//!
//! Per-food-group service handlers, the routers that dispatch to them, and
//! the presence coordinator.
//!
//! ## Architecture
//!
//! ```text
//! connection loop (oscard-daemon)
//!     |
//!     v
//! BosRouter / ChatRouter (router.rs)   -- dispatch on (food_group, sub_group)
//!     |
//!     v
//! handlers (oservice, locate, buddy, icbm, chat_nav, feedbag, chat, alert)
//!     |                         |
//!     v                         v
//! oscard-store (feedbag,    oscard-state (session fan-out,
//! users, profiles)          chat registry)
//! ```
//!
//! Handlers return the replies destined for the requesting connection; the
//! connection loop writes them with the origin request-id echoed.
//! Deliveries to *other* users go through session mailboxes as server-
//! initiated messages. Handlers always finish their store I/O before any
//! fan-out, so no registry lock ever spans a database call.

pub mod alert;
pub mod buddy;
pub mod chat;
pub mod chat_nav;
pub mod context;
pub mod feedbag;
pub mod icbm;
pub mod locate;
pub mod oservice;
pub mod presence;
pub mod router;

pub use context::ServerContext;
pub use router::{BosRouter, ChatRouter};

/// Error types for request routing and handling.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The top-level router has no handler for this food group.
    #[error("unsupported food group: 0x{0:04x}")]
    UnsupportedFoodGroup(u16),

    /// The food group's router has no handler for this subgroup.
    #[error("unsupported subgroup: 0x{food_group:04x}/0x{sub_group:04x}")]
    UnsupportedSubGroup {
        /// Food group of the offending request.
        food_group: u16,
        /// Unrecognized subgroup.
        sub_group: u16,
    },

    /// Persistence failure; connection-fatal.
    #[error("store error: {0}")]
    Store(#[from] oscard_store::StoreError),

    /// Malformed request body.
    #[error("wire error: {0}")]
    Wire(#[from] oscard_wire::WireError),
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Current unix time in seconds.
pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for handler tests.

    use std::sync::Arc;
    use std::time::Duration;

    use oscard_state::{ChatRegistry, SessionConfig, SessionManager};

    use crate::ServerContext;

    /// A context over an in-memory store with short mailbox timeouts.
    pub fn test_context() -> Arc<ServerContext> {
        let config = SessionConfig {
            mailbox_capacity: 16,
            send_timeout: Duration::from_millis(20),
        };
        Arc::new(ServerContext {
            sessions: Arc::new(SessionManager::new(config.clone())),
            chat_rooms: Arc::new(ChatRegistry::new(config)),
            db: Arc::new(tokio::sync::Mutex::new(
                oscard_store::open_memory().expect("open test db"),
            )),
            host: "127.0.0.1".to_string(),
            bos_port: 5191,
            chat_port: 5192,
        })
    }
}
