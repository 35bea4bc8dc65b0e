//! SNAC: the inner request/response layer and opcode registry.
//!
//! A SNAC is a 10-byte frame followed by a body:
//!
//! ```text
//! SnacFrame {
//!     food_group: u16,  // protocol subsystem
//!     sub_group:  u16,  // operation within the subsystem
//!     flags:      u16,
//!     request_id: u32,  // echoed into every reply for correlation
//! }
//! ```
//!
//! Subgroup 0x0001 in every food-group is the universal error reply; its
//! body is a single u16 error code.

use tokio::io::AsyncWrite;

use crate::codec::{Reader, Writer};
use crate::flap::FlapWriter;
use crate::Result;

/// Food-group (subsystem) identifiers.
pub mod foodgroup {
    /// OService, the meta-service present on every connection.
    pub const OSERVICE: u16 = 0x0001;
    /// Locate: profiles and away messages.
    pub const LOCATE: u16 = 0x0002;
    /// Buddy: legacy client-side buddy lists.
    pub const BUDDY: u16 = 0x0003;
    /// ICBM: instant messaging.
    pub const ICBM: u16 = 0x0004;
    /// ChatNav: chat-room discovery and creation.
    pub const CHAT_NAV: u16 = 0x000D;
    /// Chat: in-room messaging.
    pub const CHAT: u16 = 0x000E;
    /// Feedbag: server-stored buddy lists.
    pub const FEEDBAG: u16 = 0x0013;
    /// BUCP: the sign-on protocol.
    pub const BUCP: u16 = 0x0017;
    /// Alert: mail-alert capability negotiation.
    pub const ALERT: u16 = 0x0018;
}

/// OService subgroups.
pub mod oservice {
    pub const ERR: u16 = 0x0001;
    pub const CLIENT_ONLINE: u16 = 0x0002;
    pub const HOST_ONLINE: u16 = 0x0003;
    pub const SERVICE_REQUEST: u16 = 0x0004;
    pub const SERVICE_RESPONSE: u16 = 0x0005;
    pub const RATE_PARAMS_QUERY: u16 = 0x0006;
    pub const RATE_PARAMS_REPLY: u16 = 0x0007;
    pub const RATE_PARAMS_SUB_ADD: u16 = 0x0008;
    pub const USER_INFO_QUERY: u16 = 0x000E;
    pub const USER_INFO_UPDATE: u16 = 0x000F;
    pub const EVIL_NOTIFICATION: u16 = 0x0010;
    pub const IDLE_NOTIFICATION: u16 = 0x0011;
    pub const CLIENT_VERSIONS: u16 = 0x0017;
    pub const HOST_VERSIONS: u16 = 0x0018;
    pub const SET_USER_INFO_FIELDS: u16 = 0x001E;
}

/// Locate subgroups.
pub mod locate {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const SET_INFO: u16 = 0x0004;
    pub const USER_INFO_REPLY: u16 = 0x0006;
    pub const SET_DIR_INFO: u16 = 0x0009;
    pub const SET_DIR_REPLY: u16 = 0x000A;
    pub const GET_DIR_INFO: u16 = 0x000B;
    pub const GET_DIR_REPLY: u16 = 0x000C;
    pub const SET_KEYWORD_INFO: u16 = 0x000F;
    pub const SET_KEYWORD_REPLY: u16 = 0x0010;
    pub const USER_INFO_QUERY2: u16 = 0x0015;
}

/// Buddy subgroups.
pub mod buddy {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const ADD_BUDDIES: u16 = 0x0004;
    pub const DEL_BUDDIES: u16 = 0x0005;
    pub const ARRIVED: u16 = 0x000B;
    pub const DEPARTED: u16 = 0x000C;
}

/// ICBM subgroups.
pub mod icbm {
    pub const ERR: u16 = 0x0001;
    pub const ADD_PARAMETERS: u16 = 0x0002;
    pub const PARAMETER_QUERY: u16 = 0x0004;
    pub const PARAMETER_REPLY: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0006;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0007;
    pub const EVIL_REQUEST: u16 = 0x0008;
    pub const EVIL_REPLY: u16 = 0x0009;
    pub const HOST_ACK: u16 = 0x000C;
    pub const CLIENT_EVENT: u16 = 0x0014;
}

/// ChatNav subgroups.
pub mod chat_nav {
    pub const ERR: u16 = 0x0001;
    pub const REQUEST_CHAT_RIGHTS: u16 = 0x0002;
    pub const REQUEST_EXCHANGE_INFO: u16 = 0x0003;
    pub const REQUEST_ROOM_INFO: u16 = 0x0004;
    pub const CREATE_ROOM: u16 = 0x0008;
    pub const NAV_INFO: u16 = 0x0009;
}

/// Chat subgroups.
pub mod chat {
    pub const ERR: u16 = 0x0001;
    pub const ROOM_INFO_UPDATE: u16 = 0x0002;
    pub const USERS_JOINED: u16 = 0x0003;
    pub const USERS_LEFT: u16 = 0x0004;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0006;
}

/// Feedbag subgroups.
pub mod feedbag {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const QUERY: u16 = 0x0004;
    pub const QUERY_IF_MODIFIED: u16 = 0x0005;
    pub const REPLY: u16 = 0x0006;
    pub const USE: u16 = 0x0007;
    pub const INSERT_ITEM: u16 = 0x0008;
    pub const UPDATE_ITEM: u16 = 0x0009;
    pub const DELETE_ITEM: u16 = 0x000A;
    pub const STATUS: u16 = 0x000E;
    pub const REPLY_NOT_MODIFIED: u16 = 0x000F;
    pub const START_CLUSTER: u16 = 0x0011;
    pub const END_CLUSTER: u16 = 0x0012;
}

/// BUCP subgroups.
pub mod bucp {
    pub const ERR: u16 = 0x0001;
    pub const LOGIN_REQUEST: u16 = 0x0002;
    pub const LOGIN_RESPONSE: u16 = 0x0003;
    pub const CHALLENGE_REQUEST: u16 = 0x0006;
    pub const CHALLENGE_RESPONSE: u16 = 0x0007;
}

/// Alert subgroups.
pub mod alert {
    pub const ERR: u16 = 0x0001;
    pub const NOTIFY_CAPABILITIES: u16 = 0x0006;
    pub const NOTIFY_DISPLAY_CAPABILITIES: u16 = 0x0016;
}

/// SNAC error codes, carried in the universal subgroup-0x0001 reply.
pub mod errcode {
    pub const INVALID_SNAC: u16 = 0x0001;
    pub const RATE_TO_HOST: u16 = 0x0002;
    pub const RATE_TO_CLIENT: u16 = 0x0003;
    pub const NOT_LOGGED_ON: u16 = 0x0004;
    pub const SERVICE_UNAVAILABLE: u16 = 0x0005;
    pub const SERVICE_NOT_DEFINED: u16 = 0x0006;
    pub const NOT_SUPPORTED_BY_HOST: u16 = 0x0008;
    pub const NOT_SUPPORTED_BY_CLIENT: u16 = 0x0009;
    pub const REFUSED_BY_CLIENT: u16 = 0x000A;
    pub const REQUEST_DENIED: u16 = 0x000D;
    pub const INSUFFICIENT_RIGHTS: u16 = 0x000F;
    pub const IN_LOCAL_PERMIT_DENY: u16 = 0x0010;
}

/// The universal error-reply subgroup present in every food-group.
pub const SUBGROUP_ERR: u16 = 0x0001;

/// The 10-byte SNAC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnacFrame {
    /// Protocol subsystem.
    pub food_group: u16,
    /// Operation within the subsystem.
    pub sub_group: u16,
    /// Frame flags; the server always writes 0.
    pub flags: u16,
    /// Request/response correlation id; 0 for server-initiated frames.
    pub request_id: u32,
}

impl SnacFrame {
    /// A frame with zero flags and request id.
    pub fn new(food_group: u16, sub_group: u16) -> Self {
        Self {
            food_group,
            sub_group,
            flags: 0,
            request_id: 0,
        }
    }

    /// Append the frame's 10-byte encoding.
    pub fn encode(&self, w: &mut Writer) {
        w.u16(self.food_group);
        w.u16(self.sub_group);
        w.u16(self.flags);
        w.u32(self.request_id);
    }

    /// Read a frame.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            food_group: r.u16()?,
            sub_group: r.u16()?,
            flags: r.u16()?,
            request_id: r.u32()?,
        })
    }
}

/// A SNAC frame plus its marshalled body — the unit queued into session
/// mailboxes and written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnacMessage {
    /// The frame.
    pub frame: SnacFrame,
    /// Marshalled body bytes.
    pub body: Vec<u8>,
}

impl SnacMessage {
    /// Bundle a frame and body.
    pub fn new(frame: SnacFrame, body: Vec<u8>) -> Self {
        Self { frame, body }
    }
}

/// Build the universal error reply for `food_group`.
pub fn error_message(food_group: u16, code: u16) -> SnacMessage {
    let mut w = Writer::new();
    w.u16(code);
    SnacMessage::new(SnacFrame::new(food_group, SUBGROUP_ERR), w.into_vec())
}

/// Write one SNAC message inside a FLAP `Data` envelope.
///
/// When `origin_request_id` is non-zero it is copied into the outgoing
/// frame, correlating the reply with the request that caused it. The FLAP
/// payload length is always exactly the marshalled frame-plus-body length.
pub async fn write_snac<W: AsyncWrite + Unpin>(
    origin_request_id: u32,
    msg: &SnacMessage,
    w: &mut FlapWriter<W>,
) -> Result<()> {
    let mut frame = msg.frame;
    if origin_request_id != 0 {
        frame.request_id = origin_request_id;
    }

    let mut buf = Writer::new();
    frame.encode(&mut buf);
    buf.bytes(&msg.body);
    w.write_data(&buf.into_vec()).await
}
