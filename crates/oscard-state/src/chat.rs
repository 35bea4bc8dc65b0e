//! Chat-room registry.
//!
//! Rooms are created lazily (by ChatNav or by a chat service request),
//! keyed by a server-minted cookie, and each carries its own dedicated
//! [`SessionManager`] holding only that room's participants. A room whose
//! manager is empty is removed on the next participant-departure event.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use oscard_types::ChatRoom;

use crate::manager::SessionManager;
use crate::session::SessionConfig;

#[derive(Debug)]
struct ChatRoomEntry {
    room: ChatRoom,
    sessions: Arc<SessionManager>,
}

/// Cookie-addressed registry of live chat rooms.
#[derive(Debug, Default)]
pub struct ChatRegistry {
    rooms: RwLock<HashMap<String, ChatRoomEntry>>,
    session_config: SessionConfig,
}

impl ChatRegistry {
    /// A registry whose room managers use `session_config`.
    pub fn new(session_config: SessionConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            session_config,
        }
    }

    /// Register a room, creating its dedicated session manager.
    ///
    /// Returns the manager so the caller can register the creator's chat
    /// session immediately.
    pub fn register(&self, room: ChatRoom) -> Arc<SessionManager> {
        let sessions = Arc::new(SessionManager::new(self.session_config.clone()));
        if let Ok(mut rooms) = self.rooms.write() {
            debug!(cookie = %room.cookie, name = %room.name, "chat room registered");
            rooms.insert(
                room.cookie.clone(),
                ChatRoomEntry {
                    room,
                    sessions: sessions.clone(),
                },
            );
        }
        sessions
    }

    /// Look up a room and its session manager by cookie.
    pub fn retrieve(&self, cookie: &str) -> Option<(ChatRoom, Arc<SessionManager>)> {
        self.rooms
            .read()
            .ok()?
            .get(cookie)
            .map(|e| (e.room.clone(), e.sessions.clone()))
    }

    /// Drop the room if its manager is empty. Called after every
    /// participant departure. Returns true when the room was removed.
    pub fn maybe_remove_room(&self, cookie: &str) -> bool {
        let Ok(mut rooms) = self.rooms.write() else {
            return false;
        };
        let empty = rooms
            .get(cookie)
            .map(|e| e.sessions.is_empty())
            .unwrap_or(false);
        if empty {
            debug!(cookie = %cookie, "removing empty chat room");
            rooms.remove(cookie);
        }
        empty
    }
}
