//! ICBM (0x0004) — instant messaging, typing events, warnings.

use std::sync::Arc;

use oscard_state::Session;
use oscard_store::queries::feedbag;
use oscard_types::{BlockedState, ScreenName};
use oscard_wire::messages::{
    icbm_parameter_reply, icbm_tags, IcbmChannelMsgToClient, IcbmChannelMsgToHost, IcbmClientEvent,
    IcbmEvilReply, IcbmEvilRequest, IcbmHostAck, OServiceEvilNotification,
};
use oscard_wire::snac::{
    errcode, error_message, foodgroup, icbm, oservice, SnacFrame, SnacMessage,
};
use oscard_wire::tlv::Tlv;

use crate::{presence, Result, ServerContext};

/// Warning delta for an identified warning, tenths of a percent.
const EVIL_DELTA: u16 = 100;
/// Warning delta for an anonymous warning.
const EVIL_DELTA_ANON: u16 = 30;

/// ICBM handler.
pub struct IcbmHandler {
    ctx: Arc<ServerContext>,
}

impl IcbmHandler {
    /// A handler over the shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// `ParameterQuery` — static parameter reply.
    pub fn parameter_query(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::ICBM, icbm::PARAMETER_REPLY),
            icbm_parameter_reply(),
        )]
    }

    /// `ChannelMsgToHost` — deliver an instant message.
    ///
    /// Block semantics: the sender's own deny produces a permit-deny
    /// error; being denied by the recipient (or the recipient being
    /// offline) is indistinguishable from the recipient not being logged
    /// on. Exactly one error reply on the sender's wire, zero bytes to the
    /// recipient.
    pub async fn channel_msg_to_host(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = IcbmChannelMsgToHost::decode(body)?;
        let recipient = ScreenName::new(request.screen_name.as_str());

        let blocked = {
            let conn = self.ctx.db.lock().await;
            feedbag::blocked(&conn, session.screen_name(), &recipient)?
        };
        match blocked {
            BlockedState::ABlockedB | BlockedState::Mutual => {
                return Ok(vec![error_message(
                    foodgroup::ICBM,
                    errcode::IN_LOCAL_PERMIT_DENY,
                )]);
            }
            BlockedState::BBlockedA => {
                return Ok(vec![error_message(foodgroup::ICBM, errcode::NOT_LOGGED_ON)]);
            }
            BlockedState::None => {}
        }

        let Some(target) = self.ctx.sessions.retrieve_by_screen_name(&recipient) else {
            return Ok(vec![error_message(foodgroup::ICBM, errcode::NOT_LOGGED_ON)]);
        };

        let wants_ack = request.tlvs.has(icbm_tags::REQUEST_HOST_ACK);

        // The delivered copy never carries the ack-request TLV, and always
        // advertises event support.
        let mut tlvs = request.tlvs.clone();
        tlvs.remove(icbm_tags::REQUEST_HOST_ACK);
        if !tlvs.has(icbm_tags::WANT_EVENTS) {
            tlvs.push(Tlv::new(icbm_tags::WANT_EVENTS, Vec::new()));
        }

        let delivery = SnacMessage::new(
            SnacFrame::new(foodgroup::ICBM, icbm::CHANNEL_MSG_TO_CLIENT),
            IcbmChannelMsgToClient {
                cookie: request.cookie,
                channel: request.channel,
                sender: session.tlv_user_info(),
                tlvs,
            }
            .to_bytes(),
        );
        self.ctx.sessions.deliver(&target, delivery).await;

        if wants_ack {
            Ok(vec![SnacMessage::new(
                SnacFrame::new(foodgroup::ICBM, icbm::HOST_ACK),
                IcbmHostAck {
                    cookie: request.cookie,
                    channel: request.channel,
                    screen_name: request.screen_name,
                }
                .to_bytes(),
            )])
        } else {
            Ok(Vec::new())
        }
    }

    /// `ClientEvent` — relay a typing notification, rewriting the screen
    /// name to the sender's. Blocked pairs drop silently.
    pub async fn client_event(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let mut event = IcbmClientEvent::decode(body)?;
        let target = ScreenName::new(event.screen_name.as_str());

        let blocked = {
            let conn = self.ctx.db.lock().await;
            feedbag::blocked(&conn, session.screen_name(), &target)?
        };
        if blocked.is_blocked() {
            return Ok(Vec::new());
        }

        event.screen_name = session.screen_name().as_str().to_string();
        let forward = SnacMessage::new(
            SnacFrame::new(foodgroup::ICBM, icbm::CLIENT_EVENT),
            event.to_bytes(),
        );
        self.ctx.sessions.send_to_screen_name(&target, forward).await;
        Ok(Vec::new())
    }

    /// `EvilRequest` — warn another user.
    pub async fn evil_request(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let request = IcbmEvilRequest::decode(body)?;
        let target = ScreenName::new(request.screen_name.as_str());

        if &target == session.screen_name() {
            return Ok(vec![error_message(
                foodgroup::ICBM,
                errcode::NOT_SUPPORTED_BY_HOST,
            )]);
        }

        let blocked = {
            let conn = self.ctx.db.lock().await;
            feedbag::blocked(&conn, session.screen_name(), &target)?
        };
        if blocked.is_blocked() {
            return Ok(vec![error_message(foodgroup::ICBM, errcode::NOT_LOGGED_ON)]);
        }

        let Some(target_sess) = self.ctx.sessions.retrieve_by_screen_name(&target) else {
            return Ok(vec![error_message(foodgroup::ICBM, errcode::NOT_LOGGED_ON)]);
        };

        let anonymous = request.send_as != 0;
        let delta = if anonymous { EVIL_DELTA_ANON } else { EVIL_DELTA };
        let (applied, new_level) = target_sess.incr_warning(delta);

        let notification = SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::EVIL_NOTIFICATION),
            OServiceEvilNotification {
                new_evil: new_level,
                snitcher: (!anonymous).then(|| session.tlv_user_info()),
            }
            .to_bytes(),
        );
        self.ctx.sessions.deliver(&target_sess, notification).await;

        // Watchers see the raised warning level on the next arrival.
        presence::broadcast_arrival(&self.ctx, &target_sess).await?;

        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::ICBM, icbm::EVIL_REPLY),
            IcbmEvilReply {
                evil_delta_applied: applied,
                updated_evil_value: new_level,
            }
            .to_bytes(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_context;
    use oscard_types::feedbag::CLASS_DENY;
    use oscard_types::FeedbagItem;
    use oscard_wire::tlv::TlvBlock;

    fn deny_item(name: &str) -> FeedbagItem {
        FeedbagItem {
            name: name.to_string(),
            group_id: 1,
            item_id: 1,
            class_id: CLASS_DENY,
            tlvs: Vec::new(),
        }
    }

    fn msg_to(recipient: &str, with_ack: bool) -> Vec<u8> {
        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::string(icbm_tags::MESSAGE_DATA, "hi"));
        if with_ack {
            tlvs.push(Tlv::new(icbm_tags::REQUEST_HOST_ACK, Vec::new()));
        }
        IcbmChannelMsgToHost {
            cookie: [9; 8],
            channel: 1,
            screen_name: recipient.to_string(),
            tlvs,
        }
        .to_bytes()
    }

    #[tokio::test]
    async fn test_delivery_filters_tlvs_and_acks() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut bob_rx = bob.take_mailbox().expect("mailbox");

        let replies = handler
            .channel_msg_to_host(&alice, &msg_to("bob", true))
            .await
            .expect("send");

        // Ack to alice.
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.sub_group, icbm::HOST_ACK);
        let ack = IcbmHostAck::decode(&replies[0].body).expect("ack");
        assert_eq!(ack.screen_name, "bob");

        // Delivery to bob: sender info attached, ack TLV stripped, events
        // wanted.
        let delivered = bob_rx.recv().await.expect("delivery");
        assert_eq!(delivered.frame.sub_group, icbm::CHANNEL_MSG_TO_CLIENT);
        let msg = IcbmChannelMsgToClient::decode(&delivered.body).expect("decode");
        assert_eq!(msg.sender.screen_name, "alice");
        assert_eq!(msg.cookie, [9; 8]);
        assert!(!msg.tlvs.has(icbm_tags::REQUEST_HOST_ACK));
        assert!(msg.tlvs.has(icbm_tags::WANT_EVENTS));
        assert_eq!(
            msg.tlvs.string(icbm_tags::MESSAGE_DATA).as_deref(),
            Some("hi")
        );
    }

    #[tokio::test]
    async fn test_no_ack_without_request() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let _bob = ctx.sessions.new_session("b", ScreenName::new("bob"));

        let replies = handler
            .channel_msg_to_host(&alice, &msg_to("bob", false))
            .await
            .expect("send");
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_sender_block_gets_permit_deny_error() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut bob_rx = bob.take_mailbox().expect("mailbox");
        {
            let conn = ctx.db.lock().await;
            feedbag::upsert(&conn, &ScreenName::new("alice"), &[deny_item("bob")], 100)
                .expect("alice denies bob");
        }

        let replies = handler
            .channel_msg_to_host(&alice, &msg_to("bob", true))
            .await
            .expect("send");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.sub_group, icbm::ERR);
        assert_eq!(replies[0].body, errcode::IN_LOCAL_PERMIT_DENY.to_be_bytes());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recipient_block_looks_like_offline() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let _bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        {
            let conn = ctx.db.lock().await;
            feedbag::upsert(&conn, &ScreenName::new("bob"), &[deny_item("alice")], 100)
                .expect("bob denies alice");
        }

        let replies = handler
            .channel_msg_to_host(&alice, &msg_to("bob", false))
            .await
            .expect("send");
        assert_eq!(replies[0].body, errcode::NOT_LOGGED_ON.to_be_bytes());
    }

    #[tokio::test]
    async fn test_typing_event_rewrites_sender() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut bob_rx = bob.take_mailbox().expect("mailbox");

        let body = IcbmClientEvent {
            cookie: [1; 8],
            channel: 1,
            screen_name: "bob".to_string(),
            event: 2,
        }
        .to_bytes();
        handler.client_event(&alice, &body).await.expect("event");

        let forwarded = bob_rx.recv().await.expect("forwarded");
        let event = IcbmClientEvent::decode(&forwarded.body).expect("decode");
        assert_eq!(event.screen_name, "alice");
        assert_eq!(event.event, 2);
    }

    #[tokio::test]
    async fn test_anonymous_warning_flow() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut bob_rx = bob.take_mailbox().expect("mailbox");

        let body = IcbmEvilRequest {
            send_as: 1,
            screen_name: "bob".to_string(),
        }
        .to_bytes();
        let replies = handler.evil_request(&alice, &body).await.expect("warn");

        assert_eq!(bob.warning(), 30);
        let reply = IcbmEvilReply::decode(&replies[0].body).expect("reply");
        assert_eq!(reply.evil_delta_applied, 30);
        assert_eq!(reply.updated_evil_value, 30);

        let note = bob_rx.recv().await.expect("notification");
        assert_eq!(note.frame.food_group, foodgroup::OSERVICE);
        assert_eq!(note.frame.sub_group, oservice::EVIL_NOTIFICATION);
        let decoded = OServiceEvilNotification::decode(&note.body).expect("decode");
        assert_eq!(decoded.new_evil, 30);
        assert!(decoded.snitcher.is_none());
    }

    #[tokio::test]
    async fn test_self_warning_rejected() {
        let ctx = test_context();
        let handler = IcbmHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let body = IcbmEvilRequest {
            send_as: 0,
            screen_name: "ALICE".to_string(),
        }
        .to_bytes();
        let replies = handler.evil_request(&alice, &body).await.expect("warn");
        assert_eq!(replies[0].body, errcode::NOT_SUPPORTED_BY_HOST.to_be_bytes());
        assert_eq!(alice.warning(), 0);
    }
}
