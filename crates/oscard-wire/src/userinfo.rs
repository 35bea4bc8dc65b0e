//! The TLV user-info block.
//!
//! Presence and messaging SNACs embed a compact description of a user:
//! screen name, warning level, and a counted TLV list (class flags, sign-on
//! time, idle minutes). Departure notices carry the same block with the TLV
//! list stripped — a protocol quirk period clients rely on.

use crate::codec::{Reader, Writer};
use crate::tlv::{Tlv, TlvBlock};
use crate::Result;

/// User-info TLV tags.
pub mod tags {
    /// User class bitmask (0x0010 = normal AIM account).
    pub const USER_FLAGS: u16 = 0x0001;
    /// Sign-on time, unix seconds.
    pub const SIGNON_TOD: u16 = 0x0003;
    /// Idle time, whole minutes.
    pub const IDLE_TIME: u16 = 0x0004;
}

/// User class flag: a regular AIM account.
pub const USER_FLAG_NORMAL: u16 = 0x0010;
/// User class flag: away.
pub const USER_FLAG_UNAVAILABLE: u16 = 0x0020;

/// The user-info block: screen name, warning level, counted TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvUserInfo {
    /// Display-form screen name.
    pub screen_name: String,
    /// Warning level in tenths of a percent (300 = 3.0%).
    pub warning_level: u16,
    /// Attribute TLVs.
    pub tlvs: TlvBlock,
}

impl TlvUserInfo {
    /// Build a block with the standard attribute set.
    pub fn new(
        screen_name: impl Into<String>,
        warning_level: u16,
        user_flags: u16,
        signon_time: u32,
        idle_minutes: Option<u32>,
    ) -> Self {
        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::u16(tags::USER_FLAGS, user_flags));
        tlvs.push(Tlv::u32(tags::SIGNON_TOD, signon_time));
        if let Some(mins) = idle_minutes {
            tlvs.push(Tlv::u32(tags::IDLE_TIME, mins));
        }
        Self {
            screen_name: screen_name.into(),
            warning_level,
            tlvs,
        }
    }

    /// The same user with the TLV list stripped, as departure notices
    /// require.
    pub fn stripped(&self) -> Self {
        Self {
            screen_name: self.screen_name.clone(),
            warning_level: self.warning_level,
            tlvs: TlvBlock::new(),
        }
    }

    /// Append the wire encoding: name, warning, TLV count, TLVs.
    pub fn encode(&self, w: &mut Writer) {
        w.str8(&self.screen_name);
        w.u16(self.warning_level);
        w.u16(self.tlvs.len() as u16);
        self.tlvs.encode(w);
    }

    /// Read one user-info block.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let screen_name = r.str8()?;
        let warning_level = r.u16()?;
        let count = r.u16()? as usize;
        let tlvs = TlvBlock::decode_counted(r, count)?;
        Ok(Self {
            screen_name,
            warning_level,
            tlvs,
        })
    }
}
