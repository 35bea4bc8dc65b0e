//! Integration test: the full chat-room round trip.
//!
//! 1. alice asks BOS for a chat redirect with embedded room info
//! 2. the response carries the chat address, a login cookie, and the chat
//!    group id
//! 3. redeeming the cookie on a CHAT connection binds the room: host
//!    online, room info, self in the roster
//! 4. a second participant's join is broadcast to the first
//! 5. room messages reach everyone but the sender, with sender info
//!    attached
//! 6. after the last participant leaves, the room is garbage-collected

use std::time::Duration;

use oscard_integration_tests::harness::{FlapClient, TestServer};
use oscard_types::ScreenName;
use oscard_wire::codec::{Reader, Writer};
use oscard_wire::messages::{
    chat_tags, service_tags, ChatChannelMsg, ChatUsers, OServiceServiceRequest,
    OServiceServiceResponse,
};
use oscard_wire::snac::{chat, foodgroup, oservice};
use oscard_wire::tlv::{Tlv, TlvBlock};
use oscard_wire::userinfo::TlvUserInfo;

async fn bos_online(server: &TestServer, session_id: &str, name: &str) -> FlapClient {
    server
        .ctx
        .sessions
        .new_session(session_id, ScreenName::new(name));
    let mut client = FlapClient::new(server.connect_bos());
    client.signon(Some(session_id.as_bytes())).await;
    client.read_snac().await; // host online
    client
}

fn chat_service_request(room_cookie: &str) -> Vec<u8> {
    let mut room_info = Writer::new();
    room_info.u16(4); // exchange
    room_info.str8(room_cookie);
    room_info.u16(100); // instance
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::new(service_tags::ROOM_INFO, room_info.into_vec()));
    OServiceServiceRequest {
        food_group: foodgroup::CHAT,
        tlvs,
    }
    .to_bytes()
}

/// Redirect through BOS and bind the resulting CHAT connection.
async fn join_chat(server: &TestServer, bos: &mut FlapClient, room_cookie: &str) -> FlapClient {
    bos.send_snac(
        foodgroup::OSERVICE,
        oservice::SERVICE_REQUEST,
        &chat_service_request(room_cookie),
    )
    .await;
    let reply = bos
        .read_snac_matching(foodgroup::OSERVICE, oservice::SERVICE_RESPONSE)
        .await;
    let response = OServiceServiceResponse::decode(&reply.body).expect("response");
    assert_eq!(
        response.tlvs.string(service_tags::RECONNECT_HERE).as_deref(),
        Some("127.0.0.1:5192")
    );
    assert_eq!(
        response.tlvs.u16(service_tags::GROUP_ID),
        Some(foodgroup::CHAT)
    );
    let cookie = response
        .tlvs
        .bytes(service_tags::LOGIN_COOKIE)
        .expect("login cookie")
        .to_vec();

    let mut chat_client = FlapClient::new(server.connect_chat());
    chat_client.signon(Some(&cookie)).await;

    // Chat host-online advertises the chat food-group set.
    let host_online = chat_client.read_snac().await;
    assert_eq!(host_online.frame.sub_group, oservice::HOST_ONLINE);
    let mut r = Reader::new(&host_online.body);
    let mut groups = Vec::new();
    while !r.is_empty() {
        groups.push(r.u16().expect("group"));
    }
    assert_eq!(groups, vec![foodgroup::OSERVICE, foodgroup::CHAT]);

    chat_client
        .send_snac(foodgroup::OSERVICE, oservice::CLIENT_ONLINE, &[])
        .await;
    chat_client
}

#[tokio::test]
async fn chat_room_round_trip() {
    let server = TestServer::new(false);

    // --- alice creates and joins the room ---
    let mut alice_bos = bos_online(&server, "sess-a", "alice").await;
    let mut alice_chat = join_chat(&server, &mut alice_bos, "c1").await;

    let room_info = alice_chat
        .read_snac_matching(foodgroup::CHAT, chat::ROOM_INFO_UPDATE)
        .await;
    assert!(!room_info.body.is_empty());

    let roster_msg = alice_chat
        .read_snac_matching(foodgroup::CHAT, chat::USERS_JOINED)
        .await;
    let roster = ChatUsers::decode(&roster_msg.body).expect("roster");
    assert_eq!(roster.users.len(), 1);
    assert_eq!(roster.users[0].screen_name, "alice");

    // --- bob joins; alice hears about it ---
    let mut bob_bos = bos_online(&server, "sess-b", "bob").await;
    let mut bob_chat = join_chat(&server, &mut bob_bos, "c1").await;
    bob_chat
        .read_snac_matching(foodgroup::CHAT, chat::USERS_JOINED)
        .await; // bob's own roster

    let join_notice = alice_chat
        .read_snac_matching(foodgroup::CHAT, chat::USERS_JOINED)
        .await;
    let joined = ChatUsers::decode(&join_notice.body).expect("join notice");
    assert_eq!(joined.users[0].screen_name, "bob");

    // --- bob speaks; alice receives with sender info, bob does not ---
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(chat_tags::MESSAGE_INFO, "hello room"));
    bob_chat
        .send_snac(
            foodgroup::CHAT,
            chat::CHANNEL_MSG_TO_HOST,
            &ChatChannelMsg {
                cookie: [1; 8],
                channel: 3,
                tlvs,
            }
            .to_bytes(),
        )
        .await;

    let delivered = alice_chat
        .read_snac_matching(foodgroup::CHAT, chat::CHANNEL_MSG_TO_CLIENT)
        .await;
    let msg = ChatChannelMsg::decode(&delivered.body).expect("chat msg");
    assert_eq!(
        msg.tlvs.string(chat_tags::MESSAGE_INFO).as_deref(),
        Some("hello room")
    );
    let sender_info = msg
        .tlvs
        .bytes(chat_tags::SENDER_INFORMATION)
        .expect("sender info");
    let mut r = Reader::new(sender_info);
    let info = TlvUserInfo::decode(&mut r).expect("info");
    assert_eq!(info.screen_name, "bob");

    // --- bob leaves; alice hears users-left ---
    bob_chat.signoff().await;
    let left_notice = alice_chat
        .read_snac_matching(foodgroup::CHAT, chat::USERS_LEFT)
        .await;
    let left = ChatUsers::decode(&left_notice.body).expect("left notice");
    assert_eq!(left.users[0].screen_name, "bob");

    // Room still alive with alice in it.
    assert!(server.ctx.chat_rooms.retrieve("c1").is_some());

    // --- alice leaves; the empty room is garbage-collected ---
    alice_chat.signoff().await;
    let mut gone = false;
    for _ in 0..50 {
        if server.ctx.chat_rooms.retrieve("c1").is_none() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(gone, "room should be removed after the last departure");
}
