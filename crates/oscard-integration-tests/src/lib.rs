//! Integration test crate for the oscard server.
//!
//! The tests exercise end-to-end protocol flows — sign-on, messaging,
//! presence, chat — across the workspace crates, driving the real
//! connection handlers over in-memory duplex pipes instead of TCP.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p oscard-integration-tests
//! ```

pub mod harness;
