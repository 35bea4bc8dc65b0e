//! # oscard-wire
//!
//! The OSCAR wire protocol: framing, opcodes, and message bodies.
//!
//! OSCAR is a two-layer binary protocol, big-endian throughout:
//!
//! ```text
//! Application
//!     |
//!     v
//! SNAC (snac.rs)       -- {food_group, sub_group, flags, request_id} + body
//!     |
//!     v
//! FLAP (flap.rs)       -- 0x2A start marker, frame type, sequence, length
//!     |
//!     v
//! TCP socket
//! ```
//!
//! - [`flap`] — the outer length-delimited envelope layer
//! - [`snac`] — the inner request/response layer and opcode registry
//! - [`tlv`] — Tag-Length-Value triples, the pervasive extensibility primitive
//! - [`userinfo`] — the user-info block embedded in presence and messaging
//! - [`codec`] — big-endian cursor reader/writer primitives
//! - [`messages`] — typed bodies for every handled SNAC

pub mod codec;
pub mod flap;
pub mod messages;
pub mod snac;
pub mod tlv;
pub mod userinfo;

/// Error types for wire operations.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Ran out of bytes while decoding.
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} left")]
    UnexpectedEof {
        /// Bytes the decoder needed.
        needed: usize,
        /// Bytes that were available.
        remaining: usize,
    },

    /// FLAP frame did not start with the 0x2A marker. Connection-fatal.
    #[error("bad FLAP start marker: 0x{0:02x}")]
    BadStartMarker(u8),

    /// Unknown FLAP frame type byte.
    #[error("unknown FLAP frame type: 0x{0:02x}")]
    UnknownFrameType(u8),

    /// Payload does not fit the u16 FLAP length field.
    #[error("payload too large for FLAP: {0} bytes")]
    PayloadTooLarge(usize),

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid string encoding")]
    InvalidString,

    /// Socket read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
