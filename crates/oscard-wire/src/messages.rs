//! Typed bodies for every handled SNAC, plus the FLAP signon payload and
//! the chat login cookie.
//!
//! Each subgroup the server handles maps to a concrete struct with explicit
//! `encode`/`decode` — dispatch is static on `(food_group, sub_group)`,
//! never reflective. Client→host bodies implement `decode`, host→client
//! bodies implement `encode`, and the handful used in both directions
//! implement both.

use oscard_types::{ChatRoom, FeedbagItem};

use crate::codec::{Reader, Writer};
use crate::tlv::{Tlv, TlvBlock};
use crate::userinfo::TlvUserInfo;
use crate::Result;

// ---------------------------------------------------------------------------
// TLV tag registries
// ---------------------------------------------------------------------------

/// TLV tags used by the BUCP sign-on exchange.
pub mod auth_tags {
    /// Screen name.
    pub const SCREEN_NAME: u16 = 0x0001;
    /// URL with error details (unused value, tag reserved).
    pub const ERROR_URL: u16 = 0x0004;
    /// `host:port` the client should reconnect to.
    pub const RECONNECT_HERE: u16 = 0x0005;
    /// Authorization cookie to present on the next connection.
    pub const AUTH_COOKIE: u16 = 0x0006;
    /// Error subcode; 0x0001 = bad screen name or password.
    pub const ERROR_SUBCODE: u16 = 0x0008;
    /// MD5 login digest.
    pub const PASSWORD_HASH: u16 = 0x0025;
}

/// TLV tags used by OService service requests/responses.
pub mod service_tags {
    /// Embedded room info in a chat service request.
    pub const ROOM_INFO: u16 = 0x0001;
    /// `host:port` to reconnect to.
    pub const RECONNECT_HERE: u16 = 0x0005;
    /// Cookie to present on the redirected connection.
    pub const LOGIN_COOKIE: u16 = 0x0006;
    /// Food group the redirect serves.
    pub const GROUP_ID: u16 = 0x000D;
}

/// TLV tags inside ICBM channel messages.
pub mod icbm_tags {
    /// Message payload fragments.
    pub const MESSAGE_DATA: u16 = 0x0002;
    /// Sender requests a host acknowledgement. Never echoed to the
    /// recipient.
    pub const REQUEST_HOST_ACK: u16 = 0x0003;
    /// Recipient should send typing events.
    pub const WANT_EVENTS: u16 = 0x000B;
}

/// TLV tags inside chat channel messages.
pub mod chat_tags {
    /// Message visible to the whole room.
    pub const PUBLIC_WHISPER: u16 = 0x0001;
    /// Sender's user-info block, attached by the server.
    pub const SENDER_INFORMATION: u16 = 0x0003;
    /// Message payload.
    pub const MESSAGE_INFO: u16 = 0x0005;
    /// Sender wants its own message reflected back.
    pub const ENABLE_REFLECTION: u16 = 0x0006;
}

/// TLV tags in Locate user-info replies.
pub mod locate_tags {
    /// Profile MIME type.
    pub const SIG_MIME: u16 = 0x0001;
    /// Profile text.
    pub const SIG_DATA: u16 = 0x0002;
    /// Away-message MIME type.
    pub const UNAVAILABLE_MIME: u16 = 0x0003;
    /// Away-message text.
    pub const UNAVAILABLE_DATA: u16 = 0x0004;
}

/// Request-type bits in a Locate user-info query.
pub mod locate_request {
    /// Caller wants the profile.
    pub const SIG: u32 = 0x0001;
    /// Caller wants the away message.
    pub const AWAY: u32 = 0x0002;
}

/// TLV tags inside chat room-info blocks.
pub mod room_tags {
    /// Room display name.
    pub const NAME: u16 = 0x00D3;
    /// Room creation time, unix seconds.
    pub const CREATE_TIME: u16 = 0x00CA;
}

/// Nav-info TLV tags.
pub mod nav_tags {
    /// Maximum concurrent rooms per user.
    pub const MAX_CONCURRENT_ROOMS: u16 = 0x0002;
    /// Exchange descriptor.
    pub const EXCHANGE_INFO: u16 = 0x0003;
    /// Full room-info block.
    pub const ROOM_INFO: u16 = 0x0004;
}

/// Content MIME type used for profiles and away messages.
pub const TEXT_MIME: &str = "text/aolrtf; charset=\"us-ascii\"";

// ---------------------------------------------------------------------------
// FLAP signon payload
// ---------------------------------------------------------------------------

/// Payload of a FLAP `Signon` frame: protocol version, then TLVs.
///
/// The server's signon carries version 1 alone; the client's echoes the
/// version and, on BOS/CHAT connections, adds the login cookie in TLV 0x06.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlapSignon {
    /// FLAP protocol version; always 1.
    pub version: u32,
    /// Optional TLVs (login cookie, client identification).
    pub tlvs: TlvBlock,
}

impl FlapSignon {
    /// A version-1 signon with no TLVs.
    pub fn version_1() -> Self {
        Self {
            version: 1,
            tlvs: TlvBlock::new(),
        }
    }

    /// A version-1 signon carrying a login cookie.
    pub fn with_cookie(cookie: &[u8]) -> Self {
        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::new(auth_tags::AUTH_COOKIE, cookie.to_vec()));
        Self { version: 1, tlvs }
    }

    /// The login cookie TLV, if present.
    pub fn cookie(&self) -> Option<&[u8]> {
        self.tlvs.bytes(auth_tags::AUTH_COOKIE)
    }

    /// Encode to a standalone payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.version);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }

    /// Decode from a signon payload.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let version = r.u32()?;
        let tlvs = TlvBlock::decode_all(&mut r)?;
        Ok(Self { version, tlvs })
    }
}

// ---------------------------------------------------------------------------
// Chat login cookie
// ---------------------------------------------------------------------------

/// The serialized `{room_cookie, session_id}` pair that authorizes a CHAT
/// connection: which room, and which pre-registered participant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLoginCookie {
    /// The target room's registry cookie.
    pub room_cookie: String,
    /// The participant session id inside that room's manager.
    pub session_id: String,
}

impl ChatLoginCookie {
    /// Encode to bytes for the login-cookie TLV.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.str16(&self.room_cookie);
        w.str16(&self.session_id);
        w.into_vec()
    }

    /// Decode from login-cookie TLV bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            room_cookie: r.str16()?,
            session_id: r.str16()?,
        })
    }
}

// ---------------------------------------------------------------------------
// OService (0x0001)
// ---------------------------------------------------------------------------

/// `HostOnline` — the food groups this connection serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OServiceHostOnline {
    /// Supported food-group ids.
    pub food_groups: Vec<u16>,
}

impl OServiceHostOnline {
    /// Encode: one u16 per food group.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for fg in &self.food_groups {
            w.u16(*fg);
        }
        w.into_vec()
    }
}

/// `ServiceRequest` — client asks for a redirect to another service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OServiceServiceRequest {
    /// Requested food group.
    pub food_group: u16,
    /// Request TLVs; chat requests embed room info in tag 0x01.
    pub tlvs: TlvBlock,
}

impl OServiceServiceRequest {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let food_group = r.u16()?;
        let tlvs = TlvBlock::decode_all(&mut r)?;
        Ok(Self { food_group, tlvs })
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.food_group);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }
}

/// `ServiceResponse` — where to reconnect, and with which cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OServiceServiceResponse {
    /// Response TLVs: reconnect-here, login cookie, group id.
    pub tlvs: TlvBlock,
}

impl OServiceServiceResponse {
    /// Encode to a response body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tlvs.to_bytes()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }
}

/// `ClientVersions` / `HostVersions` — (food group, version) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OServiceVersions {
    /// Pairs of (food group, protocol version).
    pub versions: Vec<(u16, u16)>,
}

impl OServiceVersions {
    /// Decode pairs until the body ends.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut versions = Vec::new();
        while !r.is_empty() {
            versions.push((r.u16()?, r.u16()?));
        }
        Ok(Self { versions })
    }

    /// Encode as pairs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for (fg, ver) in &self.versions {
            w.u16(*fg);
            w.u16(*ver);
        }
        w.into_vec()
    }
}

/// `SetUserInfoFields` — away/capability TLVs to merge into the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OServiceSetUserInfoFields {
    /// Fields to set.
    pub tlvs: TlvBlock,
}

impl OServiceSetUserInfoFields {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }
}

/// `IdleNotification` — seconds idle; 0 clears idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OServiceIdleNotification {
    /// Idle duration in seconds, 0 to clear.
    pub idle_seconds: u32,
}

impl OServiceIdleNotification {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            idle_seconds: r.u32()?,
        })
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.idle_seconds);
        w.into_vec()
    }
}

/// `EvilNotification` — the recipient's new warning level, with the
/// snitcher's info for identified warnings and nothing for anonymous ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OServiceEvilNotification {
    /// New warning level, tenths of a percent.
    pub new_evil: u16,
    /// Warner's user info; `None` for anonymous warnings.
    pub snitcher: Option<TlvUserInfo>,
}

impl OServiceEvilNotification {
    /// Encode to a notification body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.new_evil);
        if let Some(info) = &self.snitcher {
            info.encode(&mut w);
        }
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let new_evil = r.u16()?;
        let snitcher = if r.is_empty() {
            None
        } else {
            Some(TlvUserInfo::decode(&mut r)?)
        };
        Ok(Self { new_evil, snitcher })
    }
}

/// `UserInfoUpdate` — the session's own user-info block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OServiceUserInfoUpdate {
    /// The session's current info.
    pub user_info: TlvUserInfo,
}

impl OServiceUserInfoUpdate {
    /// Encode to an update body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.user_info.encode(&mut w);
        w.into_vec()
    }
}

/// Build the fixed-shape rate-parameters reply.
///
/// The limits are pseudo-values — the server never enforces them — but the
/// reply must be structurally complete or period clients stall at sign-on:
/// one rate class with the standard eight fields, then one class-member
/// group.
pub fn rate_params_reply() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(1); // class count
    w.u16(1); // class id
    w.u32(80); // window size
    w.u32(2500); // clear level
    w.u32(2000); // alert level
    w.u32(1500); // limit level
    w.u32(800); // disconnect level
    w.u32(2500); // current level
    w.u32(6000); // max level
    w.u32(0); // last time
    w.u8(0); // current state
    w.u16(1); // group: class id
    w.u16(0); // group: pair count
    w.into_vec()
}

// ---------------------------------------------------------------------------
// Locate (0x0002)
// ---------------------------------------------------------------------------

/// `SetInfo` — optional profile and away-message TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocateSetInfo {
    /// Profile/away TLVs.
    pub tlvs: TlvBlock,
}

impl LocateSetInfo {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }

    /// The profile text, if the request set one.
    pub fn profile(&self) -> Option<String> {
        self.tlvs.string(locate_tags::SIG_DATA)
    }

    /// The away message, if the request set one. An empty string clears it.
    pub fn away_message(&self) -> Option<String> {
        self.tlvs.string(locate_tags::UNAVAILABLE_DATA)
    }
}

/// `UserInfoQuery2` — ask for another user's info, profile, away message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateUserInfoQuery2 {
    /// Request-type bitmask; see [`locate_request`].
    pub request_type: u32,
    /// Target screen name.
    pub screen_name: String,
}

impl LocateUserInfoQuery2 {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            request_type: r.u32()?,
            screen_name: r.str8()?,
        })
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.request_type);
        w.str8(&self.screen_name);
        w.into_vec()
    }
}

/// `UserInfoReply` — target info plus requested profile/away TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateUserInfoReply {
    /// Target's user-info block.
    pub user_info: TlvUserInfo,
    /// Profile/away TLVs per the request bits.
    pub tlvs: TlvBlock,
}

impl LocateUserInfoReply {
    /// Encode to a reply body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.user_info.encode(&mut w);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let user_info = TlvUserInfo::decode(&mut r)?;
        let tlvs = TlvBlock::decode_all(&mut r)?;
        Ok(Self { user_info, tlvs })
    }
}

/// Static Locate rights reply.
pub fn locate_rights_reply() -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::u16(0x0001, 1024)); // max profile length
    tlvs.push(Tlv::u16(0x0002, 16)); // max capabilities
    tlvs.to_bytes()
}

/// Fixed-OK body for SetDirInfo / SetKeywordInfo replies.
pub fn locate_ok_reply() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(0x0001);
    w.into_vec()
}

// ---------------------------------------------------------------------------
// Buddy (0x0003)
// ---------------------------------------------------------------------------

/// `BuddyArrived` — a watched user came online or changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyArrived {
    /// The arriving user's full info block.
    pub user_info: TlvUserInfo,
}

impl BuddyArrived {
    /// Encode to a notification body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.user_info.encode(&mut w);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            user_info: TlvUserInfo::decode(&mut r)?,
        })
    }
}

/// `BuddyDeparted` — a watched user went offline. The TLV block is
/// stripped: name and warning only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyDeparted {
    /// The departing user, TLVs stripped.
    pub user_info: TlvUserInfo,
}

impl BuddyDeparted {
    /// Encode to a notification body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.user_info.stripped().encode(&mut w);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            user_info: TlvUserInfo::decode(&mut r)?,
        })
    }
}

/// Static Buddy rights reply.
pub fn buddy_rights_reply() -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::u16(0x0001, 100)); // max buddies
    tlvs.push(Tlv::u16(0x0002, 100)); // max watchers
    tlvs.to_bytes()
}

// ---------------------------------------------------------------------------
// ICBM (0x0004)
// ---------------------------------------------------------------------------

/// `ChannelMsgToHost` — an outgoing instant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcbmChannelMsgToHost {
    /// Client-chosen message cookie.
    pub cookie: [u8; 8],
    /// ICBM channel (1 = plain messages).
    pub channel: u16,
    /// Recipient screen name.
    pub screen_name: String,
    /// Message TLVs.
    pub tlvs: TlvBlock,
}

impl IcbmChannelMsgToHost {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut cookie = [0u8; 8];
        cookie.copy_from_slice(r.take(8)?);
        let channel = r.u16()?;
        let screen_name = r.str8()?;
        let tlvs = TlvBlock::decode_all(&mut r)?;
        Ok(Self {
            cookie,
            channel,
            screen_name,
            tlvs,
        })
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.cookie);
        w.u16(self.channel);
        w.str8(&self.screen_name);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }
}

/// `ChannelMsgToClient` — the delivered copy of an instant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcbmChannelMsgToClient {
    /// Message cookie, copied from the sender's frame.
    pub cookie: [u8; 8],
    /// ICBM channel.
    pub channel: u16,
    /// Sender's user-info block.
    pub sender: TlvUserInfo,
    /// Filtered message TLVs.
    pub tlvs: TlvBlock,
}

impl IcbmChannelMsgToClient {
    /// Encode to a delivery body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.cookie);
        w.u16(self.channel);
        self.sender.encode(&mut w);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut cookie = [0u8; 8];
        cookie.copy_from_slice(r.take(8)?);
        let channel = r.u16()?;
        let sender = TlvUserInfo::decode(&mut r)?;
        let tlvs = TlvBlock::decode_all(&mut r)?;
        Ok(Self {
            cookie,
            channel,
            sender,
            tlvs,
        })
    }
}

/// `HostAck` — confirms delivery to the sender when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcbmHostAck {
    /// Message cookie from the acknowledged send.
    pub cookie: [u8; 8],
    /// Channel from the acknowledged send.
    pub channel: u16,
    /// Recipient screen name.
    pub screen_name: String,
}

impl IcbmHostAck {
    /// Encode to an ack body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.cookie);
        w.u16(self.channel);
        w.str8(&self.screen_name);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut cookie = [0u8; 8];
        cookie.copy_from_slice(r.take(8)?);
        Ok(Self {
            cookie,
            channel: r.u16()?,
            screen_name: r.str8()?,
        })
    }
}

/// `ClientEvent` — typing notifications, relayed peer to peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcbmClientEvent {
    /// Event cookie.
    pub cookie: [u8; 8],
    /// Channel.
    pub channel: u16,
    /// On the way in: the target. On the way out: rewritten to the sender.
    pub screen_name: String,
    /// Event code (0 = stopped, 1 = typed, 2 = typing).
    pub event: u16,
}

impl IcbmClientEvent {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut cookie = [0u8; 8];
        cookie.copy_from_slice(r.take(8)?);
        Ok(Self {
            cookie,
            channel: r.u16()?,
            screen_name: r.str8()?,
            event: r.u16()?,
        })
    }

    /// Encode for forwarding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.cookie);
        w.u16(self.channel);
        w.str8(&self.screen_name);
        w.u16(self.event);
        w.into_vec()
    }
}

/// `EvilRequest` — warn another user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcbmEvilRequest {
    /// 0 = identified, 1 = anonymous.
    pub send_as: u16,
    /// Target screen name.
    pub screen_name: String,
}

impl IcbmEvilRequest {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            send_as: r.u16()?,
            screen_name: r.str8()?,
        })
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.send_as);
        w.str8(&self.screen_name);
        w.into_vec()
    }
}

/// `EvilReply` — result of a warning: delta applied and new level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcbmEvilReply {
    /// Warning increase actually applied.
    pub evil_delta_applied: u16,
    /// Target's warning level after the increase.
    pub updated_evil_value: u16,
}

impl IcbmEvilReply {
    /// Encode to a reply body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.evil_delta_applied);
        w.u16(self.updated_evil_value);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            evil_delta_applied: r.u16()?,
            updated_evil_value: r.u16()?,
        })
    }
}

/// Static ICBM parameter reply.
pub fn icbm_parameter_reply() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(100); // max slots
    w.u32(3); // flags: channel msgs + missed calls
    w.u16(512); // max incoming message length
    w.u16(999); // max source evil
    w.u16(999); // max destination evil
    w.u32(0); // min message interval
    w.into_vec()
}

// ---------------------------------------------------------------------------
// Chat room info (shared by ChatNav and Chat)
// ---------------------------------------------------------------------------

/// Encode a room-info block: exchange, cookie, instance, detail level,
/// counted TLVs (name, create time).
pub fn encode_room_info(room: &ChatRoom) -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(room_tags::NAME, &room.name));
    tlvs.push(Tlv::u32(room_tags::CREATE_TIME, room.create_time as u32));

    let mut w = Writer::new();
    w.u16(room.exchange);
    w.str8(&room.cookie);
    w.u16(room.instance);
    w.u8(room.detail_level);
    w.u16(tlvs.len() as u16);
    tlvs.encode(&mut w);
    w.into_vec()
}

/// Decode a room-info block.
pub fn decode_room_info(buf: &[u8]) -> Result<ChatRoom> {
    let mut r = Reader::new(buf);
    let exchange = r.u16()?;
    let cookie = r.str8()?;
    let instance = r.u16()?;
    let detail_level = r.u8()?;
    let count = r.u16()? as usize;
    let tlvs = TlvBlock::decode_counted(&mut r, count)?;
    Ok(ChatRoom {
        cookie,
        exchange,
        instance,
        name: tlvs.string(room_tags::NAME).unwrap_or_default(),
        create_time: u64::from(tlvs.u32(room_tags::CREATE_TIME).unwrap_or(0)),
        detail_level,
    })
}

// ---------------------------------------------------------------------------
// ChatNav (0x000D)
// ---------------------------------------------------------------------------

/// `CreateRoom` / `RequestRoomInfo` — the client's room description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNavRoomRequest {
    /// Requested exchange.
    pub exchange: u16,
    /// Room cookie; "create" for creation requests.
    pub cookie: String,
    /// Instance number.
    pub instance: u16,
    /// Detail level.
    pub detail_level: u8,
    /// Room TLVs (name).
    pub tlvs: TlvBlock,
}

impl ChatNavRoomRequest {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let exchange = r.u16()?;
        let cookie = r.str8()?;
        let instance = r.u16()?;
        // Room-info requests may omit everything past the instance.
        let detail_level = if r.is_empty() { 0 } else { r.u8()? };
        let tlvs = if r.is_empty() {
            TlvBlock::new()
        } else {
            let count = r.u16()? as usize;
            TlvBlock::decode_counted(&mut r, count)?
        };
        Ok(Self {
            exchange,
            cookie,
            instance,
            detail_level,
            tlvs,
        })
    }

    /// The requested room name, when present.
    pub fn name(&self) -> Option<String> {
        self.tlvs.string(room_tags::NAME)
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.exchange);
        w.str8(&self.cookie);
        w.u16(self.instance);
        w.u8(self.detail_level);
        w.u16(self.tlvs.len() as u16);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }
}

/// Nav-info reply carrying one room's info block.
pub fn chat_nav_room_reply(room: &ChatRoom) -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::u8(nav_tags::MAX_CONCURRENT_ROOMS, 10));
    tlvs.push(Tlv::new(nav_tags::ROOM_INFO, encode_room_info(room)));
    tlvs.to_bytes()
}

/// Static chat-rights reply enumerating the supported exchanges.
pub fn chat_nav_rights_reply(exchanges: &[u16]) -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::u8(nav_tags::MAX_CONCURRENT_ROOMS, 10));
    for exchange in exchanges {
        let mut w = Writer::new();
        w.u16(*exchange);
        w.u16(0); // exchange TLV count
        tlvs.push(Tlv::new(nav_tags::EXCHANGE_INFO, w.into_vec()));
    }
    tlvs.to_bytes()
}

// ---------------------------------------------------------------------------
// Chat (0x000E)
// ---------------------------------------------------------------------------

/// `ChannelMsgToHost` / `ChannelMsgToClient` — a chat-room message.
///
/// Both directions share the shape; the server attaches the sender's info
/// block in TLV 0x03 on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChannelMsg {
    /// Message cookie.
    pub cookie: [u8; 8],
    /// Chat channel (3 = room messages).
    pub channel: u16,
    /// Message TLVs.
    pub tlvs: TlvBlock,
}

impl ChatChannelMsg {
    /// Decode from a body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut cookie = [0u8; 8];
        cookie.copy_from_slice(r.take(8)?);
        Ok(Self {
            cookie,
            channel: r.u16()?,
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }

    /// Encode to a body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.cookie);
        w.u16(self.channel);
        self.tlvs.encode(&mut w);
        w.into_vec()
    }
}

/// `ChatUsersJoined` / `ChatUsersLeft` — participant change notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUsers {
    /// The affected participants.
    pub users: Vec<TlvUserInfo>,
}

impl ChatUsers {
    /// Encode: concatenated user-info blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for user in &self.users {
            user.encode(&mut w);
        }
        w.into_vec()
    }

    /// Decode blocks until the body ends.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut users = Vec::new();
        while !r.is_empty() {
            users.push(TlvUserInfo::decode(&mut r)?);
        }
        Ok(Self { users })
    }
}

// ---------------------------------------------------------------------------
// Feedbag (0x0013)
// ---------------------------------------------------------------------------

/// Encode a run of feedbag items.
pub fn encode_feedbag_items(items: &[FeedbagItem], w: &mut Writer) {
    for item in items {
        w.str16(&item.name);
        w.u16(item.group_id);
        w.u16(item.item_id);
        w.u16(item.class_id);
        w.u16(item.tlvs.len() as u16);
        w.bytes(&item.tlvs);
    }
}

/// Decode feedbag items until the reader ends.
pub fn decode_feedbag_items(r: &mut Reader<'_>) -> Result<Vec<FeedbagItem>> {
    let mut items = Vec::new();
    while !r.is_empty() {
        let name = r.str16()?;
        let group_id = r.u16()?;
        let item_id = r.u16()?;
        let class_id = r.u16()?;
        let tlv_len = r.u16()? as usize;
        let tlvs = r.take(tlv_len)?.to_vec();
        items.push(FeedbagItem {
            name,
            group_id,
            item_id,
            class_id,
            tlvs,
        });
    }
    Ok(items)
}

/// `FeedbagReply` — the full stored list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbagReply {
    /// Protocol version, always 0.
    pub version: u8,
    /// Stored items.
    pub items: Vec<FeedbagItem>,
    /// Last modification time, unix seconds.
    pub last_modified: u32,
}

impl FeedbagReply {
    /// Encode to a reply body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(self.version);
        w.u16(self.items.len() as u16);
        encode_feedbag_items(&self.items, &mut w);
        w.u32(self.last_modified);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let version = r.u8()?;
        let count = r.u16()? as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let name = r.str16()?;
            let group_id = r.u16()?;
            let item_id = r.u16()?;
            let class_id = r.u16()?;
            let tlv_len = r.u16()? as usize;
            let tlvs = r.take(tlv_len)?.to_vec();
            items.push(FeedbagItem {
                name,
                group_id,
                item_id,
                class_id,
                tlvs,
            });
        }
        let last_modified = r.u32()?;
        Ok(Self {
            version,
            items,
            last_modified,
        })
    }
}

/// `QueryIfModified` / `ReplyNotModified` — timestamp plus item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbagModCheck {
    /// Unix seconds of the compared list version.
    pub last_update: u32,
    /// Item count.
    pub count: u8,
}

impl FeedbagModCheck {
    /// Decode from a body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            last_update: r.u32()?,
            count: r.u8()?,
        })
    }

    /// Encode to a body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.last_update);
        w.u8(self.count);
        w.into_vec()
    }
}

/// `FeedbagStatus` — one result code per submitted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbagStatus {
    /// Per-item result codes; 0x0000 = success.
    pub results: Vec<u16>,
}

impl FeedbagStatus {
    /// Encode to a status body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for code in &self.results {
            w.u16(*code);
        }
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let mut results = Vec::new();
        while !r.is_empty() {
            results.push(r.u16()?);
        }
        Ok(Self { results })
    }
}

/// Static Feedbag rights reply.
pub fn feedbag_rights_reply() -> Vec<u8> {
    // Max item counts for the first few classes.
    let mut maxes = Writer::new();
    for _ in 0..8 {
        maxes.u16(200);
    }
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::new(0x0004, maxes.into_vec()));
    tlvs.to_bytes()
}

// ---------------------------------------------------------------------------
// BUCP (0x0017)
// ---------------------------------------------------------------------------

/// `ChallengeRequest` / `LoginRequest` — sign-on TLVs from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucpRequest {
    /// Request TLVs (screen name; login adds the password digest).
    pub tlvs: TlvBlock,
}

impl BucpRequest {
    /// Decode from a request body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }

    /// The screen name TLV.
    pub fn screen_name(&self) -> Option<String> {
        self.tlvs.string(auth_tags::SCREEN_NAME)
    }

    /// The password digest TLV.
    pub fn password_hash(&self) -> Option<&[u8]> {
        self.tlvs.bytes(auth_tags::PASSWORD_HASH)
    }

    /// Encode (used by tests driving the server).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tlvs.to_bytes()
    }
}

/// `ChallengeResponse` — the auth key the client must fold into its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucpChallengeResponse {
    /// The challenge string.
    pub auth_key: String,
}

impl BucpChallengeResponse {
    /// Encode: u16 length, then the key bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.str16(&self.auth_key);
        w.into_vec()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            auth_key: r.str16()?,
        })
    }
}

/// `LoginResponse` — outcome TLVs: either the BOS redirect or an error
/// subcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucpLoginResponse {
    /// Response TLVs.
    pub tlvs: TlvBlock,
}

impl BucpLoginResponse {
    /// Encode to a response body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tlvs.to_bytes()
    }

    /// Decode (used by tests driving the server).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        Ok(Self {
            tlvs: TlvBlock::decode_all(&mut r)?,
        })
    }
}
