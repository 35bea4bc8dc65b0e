//! Integration test: the warning ("evil") flow.
//!
//! alice warns bob anonymously:
//! 1. bob's warning level rises by the anonymous delta (30)
//! 2. bob's wire gets an EvilNotification with no snitcher info
//! 3. bob's watcher (carol) gets a BuddyArrived refresh showing the new
//!    warning level
//! 4. alice gets an EvilReply with the applied delta and new level

use oscard_integration_tests::harness::{FlapClient, TestServer};
use oscard_store::queries::feedbag;
use oscard_types::feedbag::CLASS_BUDDY;
use oscard_types::{FeedbagItem, ScreenName};
use oscard_wire::messages::{
    BuddyArrived, IcbmEvilReply, IcbmEvilRequest, OServiceEvilNotification,
};
use oscard_wire::snac::{buddy, foodgroup, icbm, oservice};

async fn online(server: &TestServer, session_id: &str, name: &str) -> FlapClient {
    server
        .ctx
        .sessions
        .new_session(session_id, ScreenName::new(name));
    let mut client = FlapClient::new(server.connect_bos());
    client.signon(Some(session_id.as_bytes())).await;
    client.read_snac().await; // host online
    client
}

#[tokio::test]
async fn anonymous_warning_raises_and_notifies() {
    let server = TestServer::new(false);
    {
        let conn = server.ctx.db.lock().await;
        feedbag::upsert(
            &conn,
            &ScreenName::new("carol"),
            &[FeedbagItem {
                name: "bob".to_string(),
                group_id: 1,
                item_id: 1,
                class_id: CLASS_BUDDY,
                tlvs: Vec::new(),
            }],
            1_700_000_000,
        )
        .expect("carol watches bob");
    }
    let mut alice = online(&server, "sess-a", "alice").await;
    let mut bob = online(&server, "sess-b", "bob").await;
    let mut carol = online(&server, "sess-c", "carol").await;

    let req_id = alice
        .send_snac(
            foodgroup::ICBM,
            icbm::EVIL_REQUEST,
            &IcbmEvilRequest {
                send_as: 1,
                screen_name: "bob".to_string(),
            }
            .to_bytes(),
        )
        .await;

    // Alice: the evil reply, correlated.
    let reply_msg = alice.read_snac_matching(foodgroup::ICBM, icbm::EVIL_REPLY).await;
    assert_eq!(reply_msg.frame.request_id, req_id);
    let reply = IcbmEvilReply::decode(&reply_msg.body).expect("reply");
    assert_eq!(reply.evil_delta_applied, 30);
    assert_eq!(reply.updated_evil_value, 30);

    // Bob: anonymous notification with the new level.
    let note_msg = bob
        .read_snac_matching(foodgroup::OSERVICE, oservice::EVIL_NOTIFICATION)
        .await;
    let note = OServiceEvilNotification::decode(&note_msg.body).expect("notification");
    assert_eq!(note.new_evil, 30);
    assert!(note.snitcher.is_none());

    // Carol: an arrival refresh carrying bob's raised warning.
    let refresh_msg = carol
        .read_snac_matching(foodgroup::BUDDY, buddy::ARRIVED)
        .await;
    let refresh = BuddyArrived::decode(&refresh_msg.body).expect("arrival");
    assert_eq!(refresh.user_info.screen_name, "bob");
    assert_eq!(refresh.user_info.warning_level, 30);

    // Bob's session state agrees.
    let bob_sess = server
        .ctx
        .sessions
        .retrieve_by_screen_name(&ScreenName::new("bob"))
        .expect("bob session");
    assert_eq!(bob_sess.warning(), 30);
}

#[tokio::test]
async fn identified_warning_carries_snitcher() {
    let server = TestServer::new(false);
    let mut alice = online(&server, "sess-a", "alice").await;
    let mut bob = online(&server, "sess-b", "bob").await;

    alice
        .send_snac(
            foodgroup::ICBM,
            icbm::EVIL_REQUEST,
            &IcbmEvilRequest {
                send_as: 0,
                screen_name: "bob".to_string(),
            }
            .to_bytes(),
        )
        .await;

    let note_msg = bob
        .read_snac_matching(foodgroup::OSERVICE, oservice::EVIL_NOTIFICATION)
        .await;
    let note = OServiceEvilNotification::decode(&note_msg.body).expect("notification");
    assert_eq!(note.new_evil, 100);
    let snitcher = note.snitcher.expect("snitcher info");
    assert_eq!(snitcher.screen_name, "alice");
}
