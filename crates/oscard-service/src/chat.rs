//! Chat (0x000E) — in-room messaging, CHAT connections only.

use std::sync::Arc;

use oscard_state::{Session, SessionManager};
use oscard_types::ChatRoom;
use oscard_wire::messages::{chat_tags, encode_room_info, ChatChannelMsg, ChatUsers};
use oscard_wire::snac::{chat, foodgroup, SnacFrame, SnacMessage};
use oscard_wire::tlv::Tlv;
use oscard_wire::userinfo::TlvUserInfo;

use crate::Result;

/// Chat handler. Routed per connection against that connection's room.
pub struct ChatHandler;

impl ChatHandler {
    /// `ChannelMsgToHost` — relay a room message to every other
    /// participant, with the sender's info attached. A reflection TLV in
    /// the request sends the same message back to the sender too.
    pub async fn channel_msg_to_host(
        &self,
        session: &Arc<Session>,
        room_sessions: &Arc<SessionManager>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = ChatChannelMsg::decode(body)?;
        let reflect = request.tlvs.has(chat_tags::ENABLE_REFLECTION);

        let mut tlvs = request.tlvs;
        tlvs.remove(chat_tags::SENDER_INFORMATION);
        let mut info = oscard_wire::codec::Writer::new();
        session.tlv_user_info().encode(&mut info);
        tlvs.push(Tlv::new(chat_tags::SENDER_INFORMATION, info.into_vec()));

        let outgoing = SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, chat::CHANNEL_MSG_TO_CLIENT),
            ChatChannelMsg {
                cookie: request.cookie,
                channel: request.channel,
                tlvs,
            }
            .to_bytes(),
        );

        room_sessions.broadcast_except(session, &outgoing).await;

        if reflect {
            Ok(vec![outgoing])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Server-initiated `ChatRoomInfoUpdate` for a freshly bound connection.
pub fn room_info_update(room: &ChatRoom) -> SnacMessage {
    SnacMessage::new(
        SnacFrame::new(foodgroup::CHAT, chat::ROOM_INFO_UPDATE),
        encode_room_info(room),
    )
}

/// Server-initiated `ChatUsersLeft` for a departing participant.
pub fn users_left(user: TlvUserInfo) -> SnacMessage {
    SnacMessage::new(
        SnacFrame::new(foodgroup::CHAT, chat::USERS_LEFT),
        ChatUsers { users: vec![user] }.to_bytes(),
    )
}
