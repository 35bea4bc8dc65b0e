//! OService (0x0001) — the meta-service present on every connection.

use std::sync::Arc;

use tracing::debug;

use oscard_state::{random_cookie, Session, SessionManager};
use oscard_store::queries::feedbag;
use oscard_types::ChatRoom;
use oscard_wire::codec::Reader;
use oscard_wire::messages::{
    rate_params_reply, service_tags, ChatLoginCookie, ChatUsers, OServiceEvilNotification,
    OServiceHostOnline, OServiceIdleNotification, OServiceServiceRequest, OServiceServiceResponse,
    OServiceSetUserInfoFields, OServiceUserInfoUpdate, OServiceVersions,
};
use oscard_wire::snac::{chat, errcode, error_message, foodgroup, oservice, SnacFrame, SnacMessage};
use oscard_wire::tlv::Tlv;

use crate::{now_unix, presence, Result, ServerContext, ServiceError};

/// Food groups a BOS connection serves.
pub const BOS_FOOD_GROUPS: &[u16] = &[
    foodgroup::OSERVICE,
    foodgroup::LOCATE,
    foodgroup::BUDDY,
    foodgroup::ICBM,
    foodgroup::CHAT_NAV,
    foodgroup::FEEDBAG,
    foodgroup::ALERT,
];

/// Food groups a CHAT connection serves.
pub const CHAT_FOOD_GROUPS: &[u16] = &[foodgroup::OSERVICE, foodgroup::CHAT];

/// Status-TLV bit that marks a session invisible.
const STATUS_INVISIBLE: u32 = 0x0000_0100;
/// Status TLV tag in `SetUserInfoFields`.
const TAG_STATUS: u16 = 0x0006;

/// OService handler.
pub struct OServiceHandler {
    ctx: Arc<ServerContext>,
}

impl OServiceHandler {
    /// A handler over the shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// The `HostOnline` frame sent as soon as a connection is bound to a
    /// session.
    pub fn host_online(food_groups: &[u16]) -> SnacMessage {
        SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::HOST_ONLINE),
            OServiceHostOnline {
                food_groups: food_groups.to_vec(),
            }
            .to_bytes(),
        )
    }

    /// Route the subgroups shared by BOS and CHAT connections. Returns
    /// `None` for subgroups the caller must handle itself (`ClientOnline`).
    pub async fn route_common(
        &self,
        session: &Arc<Session>,
        sub_group: u16,
        body: &[u8],
    ) -> Result<Option<Vec<SnacMessage>>> {
        let replies = match sub_group {
            oservice::SERVICE_REQUEST => self.service_request(session, body).await?,
            oservice::RATE_PARAMS_QUERY => vec![SnacMessage::new(
                SnacFrame::new(foodgroup::OSERVICE, oservice::RATE_PARAMS_REPLY),
                rate_params_reply(),
            )],
            // Rate-limit subscriptions are accepted and ignored; the server
            // never enforces the pseudo-limits it advertises.
            oservice::RATE_PARAMS_SUB_ADD => Vec::new(),
            oservice::USER_INFO_QUERY => vec![self.user_info_update(session)],
            oservice::CLIENT_VERSIONS => {
                let versions = OServiceVersions::decode(body)?;
                vec![SnacMessage::new(
                    SnacFrame::new(foodgroup::OSERVICE, oservice::HOST_VERSIONS),
                    versions.to_bytes(),
                )]
            }
            oservice::SET_USER_INFO_FIELDS => self.set_user_info_fields(session, body).await?,
            oservice::IDLE_NOTIFICATION => self.idle_notification(session, body).await?,
            _ => return Ok(None),
        };
        Ok(Some(replies))
    }

    /// `ServiceRequest` — redirect the client to another service.
    ///
    /// Only chat redirects are served: the room is resolved (or lazily
    /// registered) from the embedded room info, a chat sub-session is
    /// minted in the room's manager, and the reply carries the chat
    /// address plus a login cookie binding `{room, sub-session}`. Every
    /// other food group gets a ServiceUnavailable error.
    async fn service_request(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = OServiceServiceRequest::decode(body)?;
        if request.food_group != foodgroup::CHAT {
            return Ok(vec![error_message(
                foodgroup::OSERVICE,
                errcode::SERVICE_UNAVAILABLE,
            )]);
        }
        let Some(room_info) = request.tlvs.bytes(service_tags::ROOM_INFO) else {
            return Ok(vec![error_message(
                foodgroup::OSERVICE,
                errcode::SERVICE_UNAVAILABLE,
            )]);
        };

        // Short room-info form: exchange, cookie, instance.
        let mut r = Reader::new(room_info);
        let exchange = r.u16()?;
        let room_cookie = r.str8()?;
        let instance = r.u16()?;

        let room_sessions = match self.ctx.chat_rooms.retrieve(&room_cookie) {
            Some((_, sessions)) => sessions,
            None => {
                debug!(cookie = %room_cookie, "lazily registering chat room");
                self.ctx.chat_rooms.register(ChatRoom {
                    cookie: room_cookie.clone(),
                    exchange,
                    instance,
                    name: room_cookie.clone(),
                    create_time: now_unix(),
                    detail_level: 2,
                })
            }
        };

        let chat_session_id = random_cookie();
        room_sessions.new_session(&chat_session_id, session.screen_name().clone());

        let login_cookie = ChatLoginCookie {
            room_cookie,
            session_id: chat_session_id,
        };

        let mut response = OServiceServiceResponse::default();
        response.tlvs.push(Tlv::string(
            service_tags::RECONNECT_HERE,
            &self.ctx.chat_address(),
        ));
        response
            .tlvs
            .push(Tlv::new(service_tags::LOGIN_COOKIE, login_cookie.to_bytes()));
        response
            .tlvs
            .push(Tlv::u16(service_tags::GROUP_ID, foodgroup::CHAT));

        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::SERVICE_RESPONSE),
            response.to_bytes(),
        )])
    }

    /// `SetUserInfoFields` — merge status TLVs, refresh presence.
    async fn set_user_info_fields(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = OServiceSetUserInfoFields::decode(body)?;
        if let Some(status) = request.tlvs.u32(TAG_STATUS) {
            session.set_invisible(status & STATUS_INVISIBLE != 0);
        }
        presence::broadcast_arrival(&self.ctx, session).await?;
        Ok(vec![self.user_info_update(session)])
    }

    /// `IdleNotification` — positive seconds mark idle, zero clears.
    async fn idle_notification(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = OServiceIdleNotification::decode(body)?;
        if request.idle_seconds > 0 {
            session.set_idle(request.idle_seconds);
        } else {
            session.clear_idle();
        }
        presence::broadcast_arrival(&self.ctx, session).await?;
        Ok(Vec::new())
    }

    /// `ClientOnline` on a BOS connection: initial presence.
    ///
    /// Sends the user every online visible buddy, announces the user's
    /// arrival to its watchers, and reports the current warning level.
    pub async fn client_online_bos(&self, session: &Arc<Session>) -> Result<Vec<SnacMessage>> {
        let buddies = {
            let conn = self.ctx.db.lock().await;
            feedbag::buddies(&conn, session.screen_name())?
        };

        let mut replies = Vec::new();
        for name in &buddies {
            if let Some(buddy_sess) = self.ctx.sessions.retrieve_by_screen_name(name) {
                if !buddy_sess.invisible() {
                    replies.push(presence::arrived_message(buddy_sess.tlv_user_info()));
                }
            }
        }

        presence::broadcast_arrival(&self.ctx, session).await?;

        replies.push(SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::EVIL_NOTIFICATION),
            OServiceEvilNotification {
                new_evil: session.warning(),
                snitcher: None,
            }
            .to_bytes(),
        ));
        Ok(replies)
    }

    /// `ClientOnline` on a CHAT connection: room state to the joiner, the
    /// joiner to the room.
    pub async fn client_online_chat(
        &self,
        session: &Arc<Session>,
        room: &ChatRoom,
        room_sessions: &Arc<SessionManager>,
    ) -> Result<Vec<SnacMessage>> {
        let mut replies = vec![crate::chat::room_info_update(room)];

        let participants: Vec<_> = room_sessions
            .participants()
            .iter()
            .map(|s| s.tlv_user_info())
            .collect();
        replies.push(SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, chat::USERS_JOINED),
            ChatUsers {
                users: participants,
            }
            .to_bytes(),
        ));

        let joined = SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, chat::USERS_JOINED),
            ChatUsers {
                users: vec![session.tlv_user_info()],
            }
            .to_bytes(),
        );
        room_sessions.broadcast_except(session, &joined).await;

        Ok(replies)
    }

    /// The session's own info as a `UserInfoUpdate` reply.
    fn user_info_update(&self, session: &Arc<Session>) -> SnacMessage {
        SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::USER_INFO_UPDATE),
            OServiceUserInfoUpdate {
                user_info: session.tlv_user_info(),
            }
            .to_bytes(),
        )
    }
}

/// Unknown subgroup error for the routers.
pub(crate) fn unsupported(food_group: u16, sub_group: u16) -> ServiceError {
    ServiceError::UnsupportedSubGroup {
        food_group,
        sub_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_context;
    use oscard_types::ScreenName;

    #[tokio::test]
    async fn test_chat_service_request_mints_cookie_and_sub_session() {
        let ctx = test_context();
        let handler = OServiceHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let mut request = OServiceServiceRequest {
            food_group: foodgroup::CHAT,
            tlvs: Default::default(),
        };
        let mut room_info = oscard_wire::codec::Writer::new();
        room_info.u16(4);
        room_info.str8("c1");
        room_info.u16(100);
        request
            .tlvs
            .push(Tlv::new(service_tags::ROOM_INFO, room_info.into_vec()));

        let replies = handler
            .service_request(&alice, &request.to_bytes())
            .await
            .expect("service request");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.sub_group, oservice::SERVICE_RESPONSE);

        let response = OServiceServiceResponse::decode(&replies[0].body).expect("decode");
        assert_eq!(
            response.tlvs.string(service_tags::RECONNECT_HERE).as_deref(),
            Some("127.0.0.1:5192")
        );
        assert_eq!(
            response.tlvs.u16(service_tags::GROUP_ID),
            Some(foodgroup::CHAT)
        );

        let cookie_bytes = response
            .tlvs
            .bytes(service_tags::LOGIN_COOKIE)
            .expect("cookie tlv");
        let cookie = ChatLoginCookie::decode(cookie_bytes).expect("cookie");
        assert_eq!(cookie.room_cookie, "c1");

        // The room now exists and holds the pre-registered chat session.
        let (_, room_sessions) = ctx.chat_rooms.retrieve("c1").expect("room");
        let sub = room_sessions.retrieve(&cookie.session_id).expect("session");
        assert_eq!(sub.screen_name(), &ScreenName::new("alice"));
    }

    #[tokio::test]
    async fn test_non_chat_service_request_unavailable() {
        let ctx = test_context();
        let handler = OServiceHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let request = OServiceServiceRequest {
            food_group: foodgroup::LOCATE,
            tlvs: Default::default(),
        };
        let replies = handler
            .service_request(&alice, &request.to_bytes())
            .await
            .expect("service request");
        assert_eq!(replies[0].frame.sub_group, oservice::ERR);
        assert_eq!(replies[0].body, errcode::SERVICE_UNAVAILABLE.to_be_bytes());
    }

    #[tokio::test]
    async fn test_client_online_bos_reports_online_buddies() {
        let ctx = test_context();
        let handler = OServiceHandler::new(ctx.clone());
        {
            let conn = ctx.db.lock().await;
            feedbag::upsert(
                &conn,
                &ScreenName::new("alice"),
                &[oscard_types::FeedbagItem {
                    name: "bob".to_string(),
                    group_id: 1,
                    item_id: 1,
                    class_id: oscard_types::feedbag::CLASS_BUDDY,
                    tlvs: Vec::new(),
                }],
                100,
            )
            .expect("alice's buddies");
        }
        let _bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let replies = handler.client_online_bos(&alice).await.expect("online");
        // One arrival for bob plus the warning notification.
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].frame.food_group, foodgroup::BUDDY);
        assert_eq!(
            replies[1].frame.sub_group,
            oservice::EVIL_NOTIFICATION
        );
    }

    #[tokio::test]
    async fn test_idle_notification_roundtrip() {
        let ctx = test_context();
        let handler = OServiceHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let body = OServiceIdleNotification { idle_seconds: 300 }.to_bytes();
        handler
            .idle_notification(&alice, &body)
            .await
            .expect("idle");
        assert!(alice
            .tlv_user_info()
            .tlvs
            .has(oscard_wire::userinfo::tags::IDLE_TIME));

        let body = OServiceIdleNotification { idle_seconds: 0 }.to_bytes();
        handler.idle_notification(&alice, &body).await.expect("clear");
        assert!(!alice
            .tlv_user_info()
            .tlvs
            .has(oscard_wire::userinfo::tags::IDLE_TIME));
    }

    #[tokio::test]
    async fn test_versions_echoed() {
        let ctx = test_context();
        let handler = OServiceHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let body = OServiceVersions {
            versions: vec![(foodgroup::OSERVICE, 4)],
        }
        .to_bytes();
        let replies = handler
            .route_common(&alice, oservice::CLIENT_VERSIONS, &body)
            .await
            .expect("route")
            .expect("handled");
        assert_eq!(replies[0].frame.sub_group, oservice::HOST_VERSIONS);
        assert_eq!(replies[0].body, body);
    }
}
