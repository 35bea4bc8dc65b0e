//! # oscard-daemon
//!
//! The oscard server process: configuration, the three TCP listeners
//! (AUTH, BOS, CHAT), the BUCP sign-on service, and the per-connection
//! select loops.
//!
//! ## Connection model
//!
//! ```text
//! AUTH (5190)  signon + BUCP challenge/login -> session + cookie
//!      |
//!      v
//! BOS  (5191)  cookie redemption -> host online -> select loop
//!      |
//!      v  (OService chat redirect, new cookie)
//! CHAT (5192)  chat-cookie redemption -> room-bound select loop
//! ```
//!
//! The connection handlers are generic over the byte stream, so tests
//! drive them with in-memory duplex pipes.

pub mod auth;
pub mod config;
pub mod connection;

pub use auth::AuthService;
pub use config::ServerConfig;
