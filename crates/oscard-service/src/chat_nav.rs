//! ChatNav (0x000D) — chat-room discovery and creation.

use std::sync::Arc;

use tracing::info;

use oscard_state::random_cookie;
use oscard_types::ChatRoom;
use oscard_wire::messages::{chat_nav_rights_reply, chat_nav_room_reply, ChatNavRoomRequest};
use oscard_wire::snac::{chat_nav, errcode, error_message, foodgroup, SnacFrame, SnacMessage};

use crate::{now_unix, Result, ServerContext};

/// Exchanges this server supports.
pub const SUPPORTED_EXCHANGES: &[u16] = &[4, 5];

/// ChatNav handler.
pub struct ChatNavHandler {
    ctx: Arc<ServerContext>,
}

impl ChatNavHandler {
    /// A handler over the shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// `RequestChatRights` / `RequestExchangeInfo` — the supported
    /// exchanges.
    pub fn chat_rights(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT_NAV, chat_nav::NAV_INFO),
            chat_nav_rights_reply(SUPPORTED_EXCHANGES),
        )]
    }

    /// `RequestRoomInfo` — one room's nav-info block.
    pub fn request_room_info(&self, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let request = ChatNavRoomRequest::decode(body)?;
        let Some((room, _)) = self.ctx.chat_rooms.retrieve(&request.cookie) else {
            return Ok(vec![error_message(
                foodgroup::CHAT_NAV,
                errcode::SERVICE_UNAVAILABLE,
            )]);
        };
        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT_NAV, chat_nav::NAV_INFO),
            chat_nav_room_reply(&room),
        )])
    }

    /// `CreateRoom` — mint a cookie, register the room with a dedicated
    /// session manager, reply with its nav-info.
    pub fn create_room(&self, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let request = ChatNavRoomRequest::decode(body)?;
        let cookie = random_cookie();
        let room = ChatRoom {
            cookie: cookie.clone(),
            exchange: request.exchange,
            instance: request.instance,
            name: request.name().unwrap_or_else(|| cookie.clone()),
            create_time: now_unix(),
            detail_level: request.detail_level,
        };
        info!(cookie = %room.cookie, name = %room.name, exchange = room.exchange, "creating chat room");
        self.ctx.chat_rooms.register(room.clone());

        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT_NAV, chat_nav::NAV_INFO),
            chat_nav_room_reply(&room),
        )])
    }
}
