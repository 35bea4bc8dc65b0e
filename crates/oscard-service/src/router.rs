//! Top-level routers: dispatch on `(food_group, sub_group)`.
//!
//! The connection loop hands every incoming SNAC to its router and writes
//! whatever comes back with the origin request-id echoed. Unknown food
//! groups and subgroups surface as typed errors so the loop can emit the
//! universal `InvalidSnac` reply (or terminate under fail-fast).

use std::sync::Arc;

use oscard_state::{Session, SessionManager};
use oscard_types::ChatRoom;
use oscard_wire::snac::{
    alert, buddy, chat, chat_nav, feedbag, foodgroup, icbm, locate, oservice, SnacFrame,
    SnacMessage,
};

use crate::alert::AlertHandler;
use crate::buddy::BuddyHandler;
use crate::chat::ChatHandler;
use crate::chat_nav::ChatNavHandler;
use crate::feedbag::FeedbagHandler;
use crate::icbm::IcbmHandler;
use crate::locate::LocateHandler;
use crate::oservice::{unsupported, OServiceHandler};
use crate::{Result, ServerContext, ServiceError};

/// Router for BOS connections: the full food-group set.
pub struct BosRouter {
    oservice: OServiceHandler,
    locate: LocateHandler,
    buddy: BuddyHandler,
    icbm: IcbmHandler,
    chat_nav: ChatNavHandler,
    feedbag: FeedbagHandler,
    alert: AlertHandler,
}

impl BosRouter {
    /// Build the BOS handler set over a shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            oservice: OServiceHandler::new(ctx.clone()),
            locate: LocateHandler::new(ctx.clone()),
            buddy: BuddyHandler,
            icbm: IcbmHandler::new(ctx.clone()),
            chat_nav: ChatNavHandler::new(ctx.clone()),
            feedbag: FeedbagHandler::new(ctx),
            alert: AlertHandler,
        }
    }

    /// Dispatch one request. Returns the replies for the requesting
    /// connection.
    pub async fn route(
        &self,
        session: &Arc<Session>,
        frame: SnacFrame,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        match frame.food_group {
            foodgroup::OSERVICE => {
                if let Some(replies) = self
                    .oservice
                    .route_common(session, frame.sub_group, body)
                    .await?
                {
                    return Ok(replies);
                }
                match frame.sub_group {
                    oservice::CLIENT_ONLINE => self.oservice.client_online_bos(session).await,
                    other => Err(unsupported(foodgroup::OSERVICE, other)),
                }
            }
            foodgroup::LOCATE => match frame.sub_group {
                locate::RIGHTS_QUERY => Ok(self.locate.rights_query()),
                locate::SET_INFO => self.locate.set_info(session, body).await,
                locate::USER_INFO_QUERY2 => self.locate.user_info_query2(session, body).await,
                locate::SET_DIR_INFO => Ok(self.locate.set_dir_info()),
                locate::GET_DIR_INFO => Ok(self.locate.get_dir_info()),
                locate::SET_KEYWORD_INFO => Ok(self.locate.set_keyword_info()),
                other => Err(unsupported(foodgroup::LOCATE, other)),
            },
            foodgroup::BUDDY => match frame.sub_group {
                buddy::RIGHTS_QUERY => Ok(self.buddy.rights_query()),
                buddy::ADD_BUDDIES | buddy::DEL_BUDDIES => Ok(self.buddy.edit_buddies()),
                other => Err(unsupported(foodgroup::BUDDY, other)),
            },
            foodgroup::ICBM => match frame.sub_group {
                icbm::PARAMETER_QUERY => Ok(self.icbm.parameter_query()),
                icbm::ADD_PARAMETERS => Ok(Vec::new()),
                icbm::CHANNEL_MSG_TO_HOST => self.icbm.channel_msg_to_host(session, body).await,
                icbm::CLIENT_EVENT => self.icbm.client_event(session, body).await,
                icbm::EVIL_REQUEST => self.icbm.evil_request(session, body).await,
                other => Err(unsupported(foodgroup::ICBM, other)),
            },
            foodgroup::CHAT_NAV => match frame.sub_group {
                chat_nav::REQUEST_CHAT_RIGHTS | chat_nav::REQUEST_EXCHANGE_INFO => {
                    Ok(self.chat_nav.chat_rights())
                }
                chat_nav::REQUEST_ROOM_INFO => self.chat_nav.request_room_info(body),
                chat_nav::CREATE_ROOM => self.chat_nav.create_room(body),
                other => Err(unsupported(foodgroup::CHAT_NAV, other)),
            },
            foodgroup::FEEDBAG => match frame.sub_group {
                feedbag::RIGHTS_QUERY => Ok(self.feedbag.rights_query()),
                feedbag::QUERY => self.feedbag.query(session).await,
                feedbag::QUERY_IF_MODIFIED => self.feedbag.query_if_modified(session, body).await,
                feedbag::INSERT_ITEM => self.feedbag.insert_item(session, body).await,
                feedbag::UPDATE_ITEM => self.feedbag.update_item(session, body).await,
                feedbag::DELETE_ITEM => self.feedbag.delete_item(session, body).await,
                feedbag::START_CLUSTER | feedbag::END_CLUSTER | feedbag::USE => {
                    Ok(self.feedbag.noop())
                }
                other => Err(unsupported(foodgroup::FEEDBAG, other)),
            },
            foodgroup::ALERT => match frame.sub_group {
                alert::NOTIFY_CAPABILITIES | alert::NOTIFY_DISPLAY_CAPABILITIES => {
                    Ok(self.alert.notify())
                }
                other => Err(unsupported(foodgroup::ALERT, other)),
            },
            other => Err(ServiceError::UnsupportedFoodGroup(other)),
        }
    }
}

/// Router for CHAT connections: OService plus Chat, bound to one room.
pub struct ChatRouter {
    oservice: OServiceHandler,
    chat: ChatHandler,
    room: ChatRoom,
    room_sessions: Arc<SessionManager>,
}

impl ChatRouter {
    /// Build the chat handler set for one room-bound connection.
    pub fn new(ctx: Arc<ServerContext>, room: ChatRoom, room_sessions: Arc<SessionManager>) -> Self {
        Self {
            oservice: OServiceHandler::new(ctx),
            chat: ChatHandler,
            room,
            room_sessions,
        }
    }

    /// The room this connection is bound to.
    pub fn room(&self) -> &ChatRoom {
        &self.room
    }

    /// The room's session manager.
    pub fn room_sessions(&self) -> &Arc<SessionManager> {
        &self.room_sessions
    }

    /// Dispatch one request.
    pub async fn route(
        &self,
        session: &Arc<Session>,
        frame: SnacFrame,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        match frame.food_group {
            foodgroup::OSERVICE => {
                if let Some(replies) = self
                    .oservice
                    .route_common(session, frame.sub_group, body)
                    .await?
                {
                    return Ok(replies);
                }
                match frame.sub_group {
                    oservice::CLIENT_ONLINE => {
                        self.oservice
                            .client_online_chat(session, &self.room, &self.room_sessions)
                            .await
                    }
                    other => Err(unsupported(foodgroup::OSERVICE, other)),
                }
            }
            foodgroup::CHAT => match frame.sub_group {
                chat::CHANNEL_MSG_TO_HOST => {
                    self.chat
                        .channel_msg_to_host(session, &self.room_sessions, body)
                        .await
                }
                other => Err(unsupported(foodgroup::CHAT, other)),
            },
            other => Err(ServiceError::UnsupportedFoodGroup(other)),
        }
    }
}
