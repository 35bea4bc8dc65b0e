//! Feedbag (0x0013) — server-stored buddy lists.
//!
//! Edits are persisted first, then translated into presence: adding a
//! buddy or permit shows the owner the target's arrival, adding a deny
//! makes the pair mutually invisible, deleting a deny makes them mutually
//! visible again.

use std::sync::Arc;

use oscard_state::Session;
use oscard_store::queries::feedbag as feedbag_queries;
use oscard_types::{FeedbagItem, ScreenName};
use oscard_wire::codec::Reader;
use oscard_wire::messages::{
    decode_feedbag_items, feedbag_rights_reply, FeedbagModCheck, FeedbagReply, FeedbagStatus,
};
use oscard_wire::snac::{errcode, error_message, feedbag, foodgroup, SnacFrame, SnacMessage};

use crate::{now_unix, presence, Result, ServerContext};

/// Feedbag handler.
pub struct FeedbagHandler {
    ctx: Arc<ServerContext>,
}

impl FeedbagHandler {
    /// A handler over the shared context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// `RightsQuery` — static rights reply.
    pub fn rights_query(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::FEEDBAG, feedbag::RIGHTS_REPLY),
            feedbag_rights_reply(),
        )]
    }

    /// `Query` — the full stored list plus its last-modified time.
    pub async fn query(&self, session: &Arc<Session>) -> Result<Vec<SnacMessage>> {
        let (items, last_modified) = {
            let conn = self.ctx.db.lock().await;
            (
                feedbag_queries::retrieve(&conn, session.screen_name())?,
                feedbag_queries::last_modified(&conn, session.screen_name())?,
            )
        };
        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::FEEDBAG, feedbag::REPLY),
            FeedbagReply {
                version: 0,
                items,
                last_modified: last_modified as u32,
            }
            .to_bytes(),
        )])
    }

    /// `QueryIfModified` — the full list only when it changed after the
    /// client's copy.
    pub async fn query_if_modified(
        &self,
        session: &Arc<Session>,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let check = FeedbagModCheck::decode(body)?;
        let (items, last_modified) = {
            let conn = self.ctx.db.lock().await;
            (
                feedbag_queries::retrieve(&conn, session.screen_name())?,
                feedbag_queries::last_modified(&conn, session.screen_name())?,
            )
        };

        if last_modified as u32 <= check.last_update {
            return Ok(vec![SnacMessage::new(
                SnacFrame::new(foodgroup::FEEDBAG, feedbag::REPLY_NOT_MODIFIED),
                FeedbagModCheck {
                    last_update: last_modified as u32,
                    count: items.len() as u8,
                }
                .to_bytes(),
            )]);
        }

        Ok(vec![SnacMessage::new(
            SnacFrame::new(foodgroup::FEEDBAG, feedbag::REPLY),
            FeedbagReply {
                version: 0,
                items,
                last_modified: last_modified as u32,
            }
            .to_bytes(),
        )])
    }

    /// `InsertItem` — upsert, then refresh presence per item class.
    pub async fn insert_item(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let items = decode_feedbag_items(&mut Reader::new(body))?;

        // A user cannot block itself.
        if items
            .iter()
            .any(|i| i.is_deny() && &ScreenName::new(i.name.as_str()) == session.screen_name())
        {
            return Ok(vec![error_message(
                foodgroup::FEEDBAG,
                errcode::NOT_SUPPORTED_BY_HOST,
            )]);
        }

        {
            let conn = self.ctx.db.lock().await;
            feedbag_queries::upsert(&conn, session.screen_name(), &items, now_unix())?;
        }

        for item in &items {
            let target = ScreenName::new(item.name.as_str());
            if item.is_presence_class() {
                presence::unicast_arrival(&self.ctx, &target, session).await;
            } else if item.is_deny() {
                self.mutual_departure(session, &target).await;
            }
        }

        Ok(vec![Self::status_reply(&items)])
    }

    /// `UpdateItem` — upsert; only buddy/permit classes refresh presence.
    pub async fn update_item(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let items = decode_feedbag_items(&mut Reader::new(body))?;
        {
            let conn = self.ctx.db.lock().await;
            feedbag_queries::upsert(&conn, session.screen_name(), &items, now_unix())?;
        }

        for item in &items {
            if item.is_presence_class() {
                let target = ScreenName::new(item.name.as_str());
                presence::unicast_arrival(&self.ctx, &target, session).await;
            }
        }

        Ok(vec![Self::status_reply(&items)])
    }

    /// `DeleteItem` — delete; removed denies restore mutual visibility.
    pub async fn delete_item(&self, session: &Arc<Session>, body: &[u8]) -> Result<Vec<SnacMessage>> {
        let items = decode_feedbag_items(&mut Reader::new(body))?;
        {
            let conn = self.ctx.db.lock().await;
            feedbag_queries::delete(&conn, session.screen_name(), &items, now_unix())?;
        }

        for item in &items {
            if item.is_deny() {
                let target = ScreenName::new(item.name.as_str());
                self.mutual_arrival(session, &target).await;
            }
        }

        Ok(vec![Self::status_reply(&items)])
    }

    /// `StartCluster` / `EndCluster` / `Use` — protocol no-ops.
    pub fn noop(&self) -> Vec<SnacMessage> {
        Vec::new()
    }

    /// Both directions of a fresh deny stop seeing each other.
    async fn mutual_departure(&self, session: &Arc<Session>, target: &ScreenName) {
        presence::unicast_departure(&self.ctx, target, session).await;
        if let Some(target_sess) = self.ctx.sessions.retrieve_by_screen_name(target) {
            self.ctx
                .sessions
                .deliver(
                    &target_sess,
                    presence::departed_message(session.tlv_user_info()),
                )
                .await;
        }
    }

    /// Both directions of a deleted deny see each other again, visibility
    /// permitting.
    async fn mutual_arrival(&self, session: &Arc<Session>, target: &ScreenName) {
        presence::unicast_arrival(&self.ctx, target, session).await;
        if session.invisible() {
            return;
        }
        if let Some(target_sess) = self.ctx.sessions.retrieve_by_screen_name(target) {
            self.ctx
                .sessions
                .deliver(
                    &target_sess,
                    presence::arrived_message(session.tlv_user_info()),
                )
                .await;
        }
    }

    fn status_reply(items: &[FeedbagItem]) -> SnacMessage {
        SnacMessage::new(
            SnacFrame::new(foodgroup::FEEDBAG, feedbag::STATUS),
            FeedbagStatus {
                results: vec![0x0000; items.len()],
            }
            .to_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_context;
    use oscard_types::feedbag::{CLASS_BUDDY, CLASS_DENY};
    use oscard_wire::codec::Writer;
    use oscard_wire::messages::encode_feedbag_items;
    use oscard_wire::snac::buddy;

    fn item_body(name: &str, class_id: u16) -> Vec<u8> {
        let mut w = Writer::new();
        encode_feedbag_items(
            &[FeedbagItem {
                name: name.to_string(),
                group_id: 1,
                item_id: 1,
                class_id,
                tlvs: Vec::new(),
            }],
            &mut w,
        );
        w.into_vec()
    }

    #[tokio::test]
    async fn test_insert_buddy_upserts_and_notifies() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let _bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut alice_rx = alice.take_mailbox().expect("mailbox");

        let replies = handler
            .insert_item(&alice, &item_body("bob", CLASS_BUDDY))
            .await
            .expect("insert");

        // One success code per item.
        let status = FeedbagStatus::decode(&replies[0].body).expect("status");
        assert_eq!(status.results, vec![0x0000]);

        // Store holds the item.
        let stored = {
            let conn = ctx.db.lock().await;
            feedbag_queries::retrieve(&conn, &ScreenName::new("alice")).expect("retrieve")
        };
        assert_eq!(stored.len(), 1);

        // Alice hears bob arrive.
        let arrival = alice_rx.recv().await.expect("arrival");
        assert_eq!(arrival.frame.sub_group, buddy::ARRIVED);
    }

    #[tokio::test]
    async fn test_insert_buddy_skips_invisible_target() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        bob.set_invisible(true);
        let mut alice_rx = alice.take_mailbox().expect("mailbox");

        handler
            .insert_item(&alice, &item_body("bob", CLASS_BUDDY))
            .await
            .expect("insert");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_self_block_rejected() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));

        let replies = handler
            .insert_item(&alice, &item_body("ALICE", CLASS_DENY))
            .await
            .expect("insert");
        assert_eq!(replies[0].frame.sub_group, feedbag::ERR);
        assert_eq!(replies[0].body, errcode::NOT_SUPPORTED_BY_HOST.to_be_bytes());

        let stored = {
            let conn = ctx.db.lock().await;
            feedbag_queries::retrieve(&conn, &ScreenName::new("alice")).expect("retrieve")
        };
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_deny_insert_is_mutual_departure() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));
        let mut alice_rx = alice.take_mailbox().expect("alice mailbox");
        let mut bob_rx = bob.take_mailbox().expect("bob mailbox");

        handler
            .insert_item(&alice, &item_body("bob", CLASS_DENY))
            .await
            .expect("insert");

        assert_eq!(
            alice_rx.recv().await.expect("to alice").frame.sub_group,
            buddy::DEPARTED
        );
        assert_eq!(
            bob_rx.recv().await.expect("to bob").frame.sub_group,
            buddy::DEPARTED
        );
    }

    #[tokio::test]
    async fn test_deny_delete_restores_visibility() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        let bob = ctx.sessions.new_session("b", ScreenName::new("bob"));

        handler
            .insert_item(&alice, &item_body("bob", CLASS_DENY))
            .await
            .expect("insert");
        let mut alice_rx = alice.take_mailbox().expect("alice mailbox");
        let mut bob_rx = bob.take_mailbox().expect("bob mailbox");
        // Drop the departure notices queued by the insert.
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        handler
            .delete_item(&alice, &item_body("bob", CLASS_DENY))
            .await
            .expect("delete");

        assert_eq!(
            alice_rx.recv().await.expect("to alice").frame.sub_group,
            buddy::ARRIVED
        );
        assert_eq!(
            bob_rx.recv().await.expect("to bob").frame.sub_group,
            buddy::ARRIVED
        );
    }

    #[tokio::test]
    async fn test_query_if_modified() {
        let ctx = test_context();
        let handler = FeedbagHandler::new(ctx.clone());
        let alice = ctx.sessions.new_session("a", ScreenName::new("alice"));
        handler
            .insert_item(&alice, &item_body("bob", CLASS_BUDDY))
            .await
            .expect("insert");

        let stored_mtime = {
            let conn = ctx.db.lock().await;
            feedbag_queries::last_modified(&conn, &ScreenName::new("alice")).expect("mtime")
        };

        // Client copy is current: not-modified reply.
        let body = FeedbagModCheck {
            last_update: stored_mtime as u32,
            count: 1,
        }
        .to_bytes();
        let replies = handler
            .query_if_modified(&alice, &body)
            .await
            .expect("query");
        assert_eq!(replies[0].frame.sub_group, feedbag::REPLY_NOT_MODIFIED);

        // Client copy is stale: full reply.
        let body = FeedbagModCheck {
            last_update: (stored_mtime as u32).saturating_sub(10),
            count: 0,
        }
        .to_bytes();
        let replies = handler
            .query_if_modified(&alice, &body)
            .await
            .expect("query");
        assert_eq!(replies[0].frame.sub_group, feedbag::REPLY);
        let reply = FeedbagReply::decode(&replies[0].body).expect("reply");
        assert_eq!(reply.items.len(), 1);
    }
}
