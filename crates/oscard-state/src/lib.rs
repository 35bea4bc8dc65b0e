//! # oscard-state
//!
//! In-memory session and presence fabric:
//!
//! - [`Session`] — one connected user: identity, flags, a bounded outbound
//!   mailbox, and a one-shot close signal
//! - [`SessionManager`] — keyed registry of sessions with fan-out
//!   primitives and slow-consumer ejection
//! - [`ChatRegistry`] — cookie-addressed chat rooms, each with its own
//!   session manager, garbage-collected when the last participant leaves
//!
//! Nothing here touches the network or the store; handlers push
//! [`SnacMessage`](oscard_wire::snac::SnacMessage)s into mailboxes and the
//! connection loops drain them onto the wire.

pub mod chat;
pub mod manager;
pub mod session;

pub use chat::ChatRegistry;
pub use manager::SessionManager;
pub use session::{SendResult, Session, SessionConfig};

/// Mint an unforgeable 128-bit random cookie, hex-encoded.
///
/// Used for session ids and chat-room cookies. Never derived from a
/// sequence number.
pub fn random_cookie() -> String {
    let mut bytes = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

/// Current unix time in seconds.
pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
