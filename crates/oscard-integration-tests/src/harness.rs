//! Shared test harness: an in-process server and a FLAP-speaking client.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

use oscard_daemon::connection::{run_bos_connection, run_chat_connection, ConnOptions};
use oscard_daemon::AuthService;
use oscard_service::{BosRouter, ServerContext};
use oscard_state::{ChatRegistry, SessionConfig, SessionManager};
use oscard_store::queries::users;
use oscard_types::{ScreenName, User};
use oscard_wire::flap::{FlapFrame, FlapReader, FlapWriter, FrameType};
use oscard_wire::messages::FlapSignon;
use oscard_wire::snac::{SnacFrame, SnacMessage};

/// An in-process oscard server over in-memory pipes.
pub struct TestServer {
    /// Shared handler context.
    pub ctx: Arc<ServerContext>,
    /// BOS router shared across connections.
    pub router: Arc<BosRouter>,
    /// The sign-on service.
    pub auth: Arc<AuthService>,
}

impl TestServer {
    /// A server with an in-memory store and short mailbox timeouts.
    pub fn new(disable_auth: bool) -> Self {
        let session_config = SessionConfig {
            mailbox_capacity: 64,
            send_timeout: Duration::from_millis(100),
        };
        let ctx = Arc::new(ServerContext {
            sessions: Arc::new(SessionManager::new(session_config.clone())),
            chat_rooms: Arc::new(ChatRegistry::new(session_config)),
            db: Arc::new(tokio::sync::Mutex::new(
                oscard_store::open_memory().expect("open test db"),
            )),
            host: "127.0.0.1".to_string(),
            bos_port: 5191,
            chat_port: 5192,
        });
        let router = Arc::new(BosRouter::new(ctx.clone()));
        let auth = Arc::new(AuthService::new(ctx.clone(), disable_auth));
        Self { ctx, router, auth }
    }

    /// Persist a user account.
    pub async fn seed_user(&self, screen_name: &str, auth_key: &str, password: &str) -> User {
        let user = User::new_with_password(ScreenName::new(screen_name), auth_key, password);
        let conn = self.ctx.db.lock().await;
        users::insert(&conn, &user, 1_700_000_000).expect("seed user");
        user
    }

    /// Open an AUTH connection; the server half runs in the background.
    pub fn connect_auth(&self) -> DuplexStream {
        let (client, server) = duplex(16 * 1024);
        let auth = self.auth.clone();
        tokio::spawn(async move {
            let _ = auth.handle_connection(server).await;
        });
        client
    }

    /// Open a BOS connection; the server half runs in the background.
    pub fn connect_bos(&self) -> DuplexStream {
        let (client, server) = duplex(16 * 1024);
        let ctx = self.ctx.clone();
        let router = self.router.clone();
        tokio::spawn(async move {
            let _ = run_bos_connection(server, ctx, router, ConnOptions::default()).await;
        });
        client
    }

    /// Open a CHAT connection; the server half runs in the background.
    pub fn connect_chat(&self) -> DuplexStream {
        let (client, server) = duplex(16 * 1024);
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let _ = run_chat_connection(server, ctx, ConnOptions::default()).await;
        });
        client
    }
}

/// A FLAP-speaking test client over one duplex pipe.
pub struct FlapClient {
    reader: FlapReader<ReadHalf<DuplexStream>>,
    writer: FlapWriter<WriteHalf<DuplexStream>>,
    next_request_id: u32,
}

impl FlapClient {
    /// Wrap a client-side stream.
    pub fn new(stream: DuplexStream) -> Self {
        let (r, w) = tokio::io::split(stream);
        Self {
            reader: FlapReader::new(r),
            writer: FlapWriter::new(w, 0),
            next_request_id: 1,
        }
    }

    /// Complete the signon handshake, presenting `cookie` when given.
    pub async fn signon(&mut self, cookie: Option<&[u8]>) {
        let server_signon = self.reader.read_frame().await.expect("server signon");
        assert_eq!(server_signon.frame_type, FrameType::Signon);
        let payload = match cookie {
            Some(cookie) => FlapSignon::with_cookie(cookie).to_bytes(),
            None => FlapSignon::version_1().to_bytes(),
        };
        self.writer.write_signon(&payload).await.expect("client signon");
    }

    /// Send one SNAC with a fresh request id; returns the id used.
    pub async fn send_snac(&mut self, food_group: u16, sub_group: u16, body: &[u8]) -> u32 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let frame = SnacFrame {
            food_group,
            sub_group,
            flags: 0,
            request_id,
        };
        let mut payload = oscard_wire::codec::Writer::new();
        frame.encode(&mut payload);
        payload.bytes(body);
        self.writer
            .write_data(&payload.into_vec())
            .await
            .expect("send snac");
        request_id
    }

    /// Read the next raw FLAP frame.
    pub async fn read_frame(&mut self) -> FlapFrame {
        self.reader.read_frame().await.expect("read frame")
    }

    /// Read the next `Data` frame as a SNAC.
    pub async fn read_snac(&mut self) -> SnacMessage {
        let frame = self.read_frame().await;
        assert_eq!(frame.frame_type, FrameType::Data, "expected a data frame");
        let mut r = oscard_wire::codec::Reader::new(&frame.payload);
        let snac = SnacFrame::decode(&mut r).expect("snac frame");
        SnacMessage::new(snac, r.rest().to_vec())
    }

    /// Read SNACs until one matches `(food_group, sub_group)`.
    pub async fn read_snac_matching(&mut self, food_group: u16, sub_group: u16) -> SnacMessage {
        for _ in 0..32 {
            let msg = self.read_snac().await;
            if msg.frame.food_group == food_group && msg.frame.sub_group == sub_group {
                return msg;
            }
        }
        unreachable!("no snac 0x{food_group:04x}/0x{sub_group:04x} within 32 frames")
    }

    /// Send a signoff frame.
    pub async fn signoff(&mut self) {
        self.writer.write_signoff().await.expect("signoff");
    }
}

/// Assert that nothing arrives on `client` within a short window.
///
/// Used by the block tests to prove a wire stayed silent.
pub async fn assert_silent(client: &mut FlapClient, window: Duration) {
    let result = tokio::time::timeout(window, client.read_frame()).await;
    assert!(result.is_err(), "expected silence, got a frame");
}
