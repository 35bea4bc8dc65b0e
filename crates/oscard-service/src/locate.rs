//! Locate (0x0002) — profiles and away messages.

use std::sync::Arc;

use oscard_state::Session;
use oscard_store::queries::{feedbag, profile};
use oscard_types::ScreenName;
use oscard_wire::messages::{
    locate_ok_reply, locate_request, locate_rights_reply, locate_tags, LocateSetInfo,
    LocateUserInfoQuery2, LocateUserInfoReply, TEXT_MIME,
};
use oscard_wire::snac::{errcode, error_message, foodgroup, locate, SnacFrame, SnacMessage};
use oscard_wire::tlv::{Tlv, TlvBlock};

use crate::{now_unix, presence, Result, ServerContext};

/// Locate handler.
pub struct LocateHandler {
    ctx: Arc<ServerContext>,
}

impl LocateHandler {
    /// A handler over the shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// `RightsQuery` — static rights reply.
    pub fn rights_query(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::LOCATE, locate::RIGHTS_REPLY),
            locate_rights_reply(),
        )]
    }

    /// `SetInfo` — upsert the profile and/or set the away message.
    pub async fn set_info(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let request = LocateSetInfo::decode(body)?;

        if let Some(text) = request.profile() {
            let conn = self.ctx.db.lock().await;
            profile::set(&conn, session.screen_name(), &text, now_unix())?;
        }

        if let Some(away) = request.away_message() {
            session.set_away_message(away);
            presence::broadcast_arrival(&self.ctx, session).await?;
        }

        Ok(Vec::new())
    }

    /// `UserInfoQuery2` — another user's info, profile, away message.
    ///
    /// Blocked pairs (either direction) look offline to each other.
    pub async fn user_info_query2(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let request = LocateUserInfoQuery2::decode(body)?;
        let target = ScreenName::new(request.screen_name.as_str());

        let blocked = {
            let conn = self.ctx.db.lock().await;
            feedbag::blocked(&conn, session.screen_name(), &target)?
        };
        if blocked.is_blocked() {
            return Ok(vec![error_message(
                foodgroup::LOCATE,
                errcode::NOT_LOGGED_ON,
            )]);
        }

        let Some(target_sess) = self.ctx.sessions.retrieve_by_screen_name(&target) else {
            return Ok(vec![error_message(
                foodgroup::LOCATE,
                errcode::NOT_LOGGED_ON,
            )]);
        };

        let mut tlvs = TlvBlock::new();
        if request.request_type & locate_request::SIG != 0 {
            let stored = {
                let conn = self.ctx.db.lock().await;
                profile::get(&conn, &target)?
            };
            if let Some(text) = stored {
                tlvs.push(Tlv::string(locate_tags::SIG_MIME, TEXT_MIME));
                tlvs.push(Tlv::string(locate_tags::SIG_DATA, &text));
            }
        }
        if request.request_type & locate_request::AWAY != 0 {
            let away = target_sess.away_message();
            if !away.is_empty() {
                tlvs.push(Tlv::string(locate_tags::UNAVAILABLE_MIME, TEXT_MIME));
                tlvs.push(Tlv::string(locate_tags::UNAVAILABLE_DATA, &away));
            }
        }

        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::LOCATE, locate::USER_INFO_REPLY),
            LocateUserInfoReply {
                user_info: target_sess.tlv_user_info(),
                tlvs,
            }
            .to_bytes(),
        )])
    }

    /// `SetDirInfo` — fixed-OK reply.
    pub fn set_dir_info(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::LOCATE, locate::SET_DIR_REPLY),
            locate_ok_reply(),
        )]
    }

    /// `GetDirInfo` — empty-OK reply.
    pub fn get_dir_info(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::LOCATE, locate::GET_DIR_REPLY),
            locate_ok_reply(),
        )]
    }

    /// `SetKeywordInfo` — fixed-OK reply.
    pub fn set_keyword_info(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::LOCATE, locate::SET_KEYWORD_REPLY),
            locate_ok_reply(),
        )]
    }
}
