//! # oscard-types
//!
//! Domain types shared across the oscard server crates:
//!
//! - [`ScreenName`] — AIM screen names (case- and space-insensitive identity)
//! - [`User`] — stored account record plus the AIM password digest scheme
//! - [`FeedbagItem`] — server-stored buddy-list items
//! - [`BlockedState`] — pairwise block relation derived from deny items
//! - [`ChatRoom`] — chat-room metadata
//!
//! These are plain data types. Wire encoding lives in `oscard-wire`,
//! persistence in `oscard-store`.

pub mod chat;
pub mod feedbag;
pub mod screen_name;
pub mod user;

pub use chat::ChatRoom;
pub use feedbag::{BlockedState, FeedbagItem};
pub use screen_name::ScreenName;
pub use user::User;
