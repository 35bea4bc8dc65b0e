//! Integration test: instant-message delivery, acks, and block symmetry.
//!
//! 1. Two users online over real BOS connections
//! 2. A message with a host-ack request lands on the recipient's wire with
//!    the sender's info attached and the ack TLV stripped; the sender gets
//!    exactly one HostAck
//! 3. With a block in place, the sender gets exactly one error and the
//!    recipient's wire stays silent

use std::sync::Arc;
use std::time::Duration;

use oscard_integration_tests::harness::{assert_silent, FlapClient, TestServer};
use oscard_state::Session;
use oscard_store::queries::feedbag;
use oscard_types::feedbag::CLASS_DENY;
use oscard_types::{FeedbagItem, ScreenName};
use oscard_wire::messages::{
    icbm_tags, IcbmChannelMsgToClient, IcbmChannelMsgToHost, IcbmHostAck,
};
use oscard_wire::snac::{errcode, foodgroup, icbm, oservice};
use oscard_wire::tlv::{Tlv, TlvBlock};

/// Bind a BOS connection for a pre-registered session.
async fn online(server: &TestServer, session_id: &str, name: &str) -> (FlapClient, Arc<Session>) {
    let session = server
        .ctx
        .sessions
        .new_session(session_id, ScreenName::new(name));
    let mut client = FlapClient::new(server.connect_bos());
    client.signon(Some(session_id.as_bytes())).await;
    let host_online = client.read_snac().await;
    assert_eq!(host_online.frame.sub_group, oservice::HOST_ONLINE);
    (client, session)
}

fn message_body(recipient: &str, with_ack: bool) -> Vec<u8> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(icbm_tags::MESSAGE_DATA, "hi"));
    if with_ack {
        tlvs.push(Tlv::new(icbm_tags::REQUEST_HOST_ACK, Vec::new()));
    }
    IcbmChannelMsgToHost {
        cookie: [0xAB; 8],
        channel: 1,
        screen_name: recipient.to_string(),
        tlvs,
    }
    .to_bytes()
}

#[tokio::test]
async fn message_delivery_with_ack() {
    let server = TestServer::new(false);
    let (mut alice, _) = online(&server, "sess-a", "alice").await;
    let (mut bob, _) = online(&server, "sess-b", "bob").await;

    let req_id = alice
        .send_snac(
            foodgroup::ICBM,
            icbm::CHANNEL_MSG_TO_HOST,
            &message_body("bob", true),
        )
        .await;

    // Bob's wire: one delivered message, sender info attached, ack TLV
    // gone, events wanted.
    let delivered = bob
        .read_snac_matching(foodgroup::ICBM, icbm::CHANNEL_MSG_TO_CLIENT)
        .await;
    let msg = IcbmChannelMsgToClient::decode(&delivered.body).expect("delivered");
    assert_eq!(msg.sender.screen_name, "alice");
    assert_eq!(msg.cookie, [0xAB; 8]);
    assert_eq!(msg.tlvs.string(icbm_tags::MESSAGE_DATA).as_deref(), Some("hi"));
    assert!(!msg.tlvs.has(icbm_tags::REQUEST_HOST_ACK));
    assert!(msg.tlvs.has(icbm_tags::WANT_EVENTS));

    // Alice's wire: one HostAck correlated to her request.
    let ack_msg = alice.read_snac_matching(foodgroup::ICBM, icbm::HOST_ACK).await;
    assert_eq!(ack_msg.frame.request_id, req_id);
    let ack = IcbmHostAck::decode(&ack_msg.body).expect("ack");
    assert_eq!(ack.screen_name, "bob");
}

#[tokio::test]
async fn blocked_message_one_error_zero_delivery() {
    let server = TestServer::new(false);
    {
        let conn = server.ctx.db.lock().await;
        feedbag::upsert(
            &conn,
            &ScreenName::new("alice"),
            &[FeedbagItem {
                name: "bob".to_string(),
                group_id: 1,
                item_id: 1,
                class_id: CLASS_DENY,
                tlvs: Vec::new(),
            }],
            1_700_000_000,
        )
        .expect("alice denies bob");
    }
    let (mut alice, _) = online(&server, "sess-a", "alice").await;
    let (mut bob, _) = online(&server, "sess-b", "bob").await;

    let req_id = alice
        .send_snac(
            foodgroup::ICBM,
            icbm::CHANNEL_MSG_TO_HOST,
            &message_body("bob", true),
        )
        .await;

    // Exactly one ICBM error on alice's wire, correlated.
    let err = alice.read_snac_matching(foodgroup::ICBM, icbm::ERR).await;
    assert_eq!(err.frame.request_id, req_id);
    assert_eq!(err.body, errcode::IN_LOCAL_PERMIT_DENY.to_be_bytes());

    // Zero bytes on bob's wire.
    assert_silent(&mut bob, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn offline_recipient_looks_not_logged_on() {
    let server = TestServer::new(false);
    let (mut alice, _) = online(&server, "sess-a", "alice").await;

    let req_id = alice
        .send_snac(
            foodgroup::ICBM,
            icbm::CHANNEL_MSG_TO_HOST,
            &message_body("ghost", false),
        )
        .await;

    let err = alice.read_snac_matching(foodgroup::ICBM, icbm::ERR).await;
    assert_eq!(err.frame.request_id, req_id);
    assert_eq!(err.body, errcode::NOT_LOGGED_ON.to_be_bytes());
}
