//! Chat-room metadata.

/// Metadata for one chat room.
///
/// The cookie is the server-chosen identifier clients present when joining;
/// it uniquely identifies the room in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoom {
    /// Server-minted room identifier.
    pub cookie: String,
    /// 16-bit room class ("exchange").
    pub exchange: u16,
    /// Instance number within the exchange.
    pub instance: u16,
    /// Human-readable room name.
    pub name: String,
    /// Unix timestamp of creation.
    pub create_time: u64,
    /// Detail level echoed back in room-info blocks.
    pub detail_level: u8,
}
