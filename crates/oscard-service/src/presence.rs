//! Presence coordinator.
//!
//! Translates session and buddy-list changes into `BuddyArrived` /
//! `BuddyDeparted` notices. The fan-out set is the user's watchers — the
//! accounts whose feedbags list the user as a buddy.
//!
//! Invariant: an invisible actor never causes an arrival to be emitted on
//! any wire, including when added to someone's buddy list.

use std::sync::Arc;

use oscard_wire::messages::{BuddyArrived, BuddyDeparted};
use oscard_wire::snac::{buddy, foodgroup, SnacFrame, SnacMessage};
use oscard_wire::userinfo::TlvUserInfo;

use oscard_state::Session;
use oscard_store::queries::feedbag;
use oscard_types::ScreenName;

use crate::{Result, ServerContext};

/// Build a `BuddyArrived` notice for `info`.
pub fn arrived_message(info: TlvUserInfo) -> SnacMessage {
    SnacMessage::new(
        SnacFrame::new(foodgroup::BUDDY, buddy::ARRIVED),
        BuddyArrived { user_info: info }.to_bytes(),
    )
}

/// Build a `BuddyDeparted` notice for `info`. The TLV block is stripped on
/// encode, per the protocol quirk.
pub fn departed_message(info: TlvUserInfo) -> SnacMessage {
    SnacMessage::new(
        SnacFrame::new(foodgroup::BUDDY, buddy::DEPARTED),
        BuddyDeparted { user_info: info }.to_bytes(),
    )
}

/// Announce `actor`'s arrival (or refreshed state) to every online watcher.
///
/// No-op while `actor` is invisible.
pub async fn broadcast_arrival(ctx: &ServerContext, actor: &Arc<Session>) -> Result<()> {
    if actor.invisible() {
        return Ok(());
    }
    let watchers = {
        let conn = ctx.db.lock().await;
        feedbag::interested_users(&conn, actor.screen_name())?
    };
    let msg = arrived_message(actor.tlv_user_info());
    ctx.sessions.broadcast_to_screen_names(&watchers, &msg).await;
    Ok(())
}

/// Announce `actor`'s departure to every online watcher.
pub async fn broadcast_departure(ctx: &ServerContext, actor: &Arc<Session>) -> Result<()> {
    let watchers = {
        let conn = ctx.db.lock().await;
        feedbag::interested_users(&conn, actor.screen_name())?
    };
    let msg = departed_message(actor.tlv_user_info());
    ctx.sessions.broadcast_to_screen_names(&watchers, &msg).await;
    Ok(())
}

/// Tell `observer` that `target` is online, if `target` is online and
/// visible. Used when a buddy or permit item is added.
pub async fn unicast_arrival(ctx: &ServerContext, target: &ScreenName, observer: &Arc<Session>) {
    let Some(target_sess) = ctx.sessions.retrieve_by_screen_name(target) else {
        return;
    };
    if target_sess.invisible() {
        return;
    }
    ctx.sessions
        .deliver(observer, arrived_message(target_sess.tlv_user_info()))
        .await;
}

/// Tell `observer` that `target` has departed, if `target` is online.
/// Used when a deny item makes a pair mutually invisible.
pub async fn unicast_departure(ctx: &ServerContext, target: &ScreenName, observer: &Arc<Session>) {
    let Some(target_sess) = ctx.sessions.retrieve_by_screen_name(target) else {
        return;
    };
    ctx.sessions
        .deliver(observer, departed_message(target_sess.tlv_user_info()))
        .await;
}
