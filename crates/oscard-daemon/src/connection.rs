//! BOS and CHAT connection loops.
//!
//! After the signon handshake redeems a login cookie for a session, each
//! connection runs one select loop over three sources:
//!
//! 1. incoming FLAP frames, parsed by a dedicated reader task
//! 2. the session's outbound mailbox
//! 3. the session's close signal
//!
//! Routing errors for unknown opcodes produce the universal `InvalidSnac`
//! reply and the loop continues (or the process exits under fail-fast);
//! anything that cannot produce a well-formed reply tears the connection
//! down so the stream never desyncs.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use oscard_service::{presence, BosRouter, ChatRouter, ServerContext, ServiceError};
use oscard_state::Session;
use oscard_wire::codec::Reader;
use oscard_wire::flap::{FlapFrame, FlapReader, FlapWriter, FrameType};
use oscard_wire::messages::{ChatLoginCookie, FlapSignon};
use oscard_wire::snac::{errcode, error_message, write_snac, SnacFrame};
use oscard_wire::WireError;

use oscard_service::oservice::{OServiceHandler, BOS_FOOD_GROUPS, CHAT_FOOD_GROUPS};

/// BOS and CHAT connections number their frames from 100, like AUTH.
const START_SEQUENCE: u16 = 100;

/// Connection-fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Framing or codec failure.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The peer broke the FLAP state machine.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The signon frame carried no login cookie.
    #[error("signon frame missing login cookie")]
    MissingCookie,

    /// The login cookie did not resolve to a live session or room.
    #[error("unredeemable login cookie")]
    UnknownCookie,

    /// The session's mailbox was already claimed by another connection.
    #[error("session already bound to a connection")]
    SessionBusy,

    /// Handler failure (store I/O and the like).
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Store failure outside a handler.
    #[error("store error: {0}")]
    Store(#[from] oscard_store::StoreError),
}

/// Per-connection tuning picked up from the server config.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnOptions {
    /// Terminate the process on an unsupported SNAC.
    pub fail_fast: bool,
}

enum ConnectionRouter {
    Bos(Arc<BosRouter>),
    Chat(Box<ChatRouter>),
}

impl ConnectionRouter {
    async fn route(
        &self,
        session: &Arc<Session>,
        frame: SnacFrame,
        body: &[u8],
    ) -> Result<Vec<oscard_wire::snac::SnacMessage>, ServiceError> {
        match self {
            Self::Bos(router) => router.route(session, frame, body).await,
            Self::Chat(router) => router.route(session, frame, body).await,
        }
    }
}

/// Drive one BOS connection: handshake, host-online, select loop,
/// presence teardown.
pub async fn run_bos_connection<S>(
    stream: S,
    ctx: Arc<ServerContext>,
    router: Arc<BosRouter>,
    options: ConnOptions,
) -> Result<(), ConnError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (r, w) = tokio::io::split(stream);
    let mut reader = FlapReader::new(r);
    let mut writer = FlapWriter::new(w, START_SEQUENCE);

    let signon = signon_handshake(&mut reader, &mut writer).await?;
    let cookie = signon.cookie().ok_or(ConnError::MissingCookie)?;
    let session_id =
        String::from_utf8(cookie.to_vec()).map_err(|_| ConnError::UnknownCookie)?;
    let session = ctx
        .sessions
        .retrieve(&session_id)
        .ok_or(ConnError::UnknownCookie)?;

    debug!(screen_name = %session.screen_name(), "BOS connection bound");
    write_snac(
        0,
        &OServiceHandler::host_online(BOS_FOOD_GROUPS),
        &mut writer,
    )
    .await?;

    let result = run_session_loop(
        reader,
        writer,
        &session,
        ConnectionRouter::Bos(router),
        options,
    )
    .await;

    // Teardown: watchers see the departure, then the registry forgets the
    // session.
    session.close();
    if let Err(e) = presence::broadcast_departure(&ctx, &session).await {
        warn!(error = %e, "departure broadcast failed");
    }
    ctx.sessions.remove(&session);
    debug!(screen_name = %session.screen_name(), "BOS connection closed");
    result
}

/// Drive one CHAT connection: chat-cookie redemption, room-bound select
/// loop, users-left teardown and room GC.
pub async fn run_chat_connection<S>(
    stream: S,
    ctx: Arc<ServerContext>,
    options: ConnOptions,
) -> Result<(), ConnError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (r, w) = tokio::io::split(stream);
    let mut reader = FlapReader::new(r);
    let mut writer = FlapWriter::new(w, START_SEQUENCE);

    let signon = signon_handshake(&mut reader, &mut writer).await?;
    let cookie_bytes = signon.cookie().ok_or(ConnError::MissingCookie)?;
    let cookie = ChatLoginCookie::decode(cookie_bytes)?;

    let (room, room_sessions) = ctx
        .chat_rooms
        .retrieve(&cookie.room_cookie)
        .ok_or(ConnError::UnknownCookie)?;
    let session = room_sessions
        .retrieve(&cookie.session_id)
        .ok_or(ConnError::UnknownCookie)?;

    debug!(screen_name = %session.screen_name(), room = %room.name, "CHAT connection bound");
    write_snac(
        0,
        &OServiceHandler::host_online(CHAT_FOOD_GROUPS),
        &mut writer,
    )
    .await?;

    let room_cookie = room.cookie.clone();
    let router = ChatRouter::new(ctx.clone(), room, room_sessions.clone());
    let result = run_session_loop(
        reader,
        writer,
        &session,
        ConnectionRouter::Chat(Box::new(router)),
        options,
    )
    .await;

    // Teardown: the rest of the room hears the departure, the empty room
    // is garbage-collected.
    session.close();
    room_sessions
        .broadcast_except(
            &session,
            &oscard_service::chat::users_left(session.tlv_user_info()),
        )
        .await;
    room_sessions.remove(&session);
    ctx.chat_rooms.maybe_remove_room(&room_cookie);
    result
}

/// Exchange FLAP signon frames and return the client's.
async fn signon_handshake<R, W>(
    reader: &mut FlapReader<R>,
    writer: &mut FlapWriter<W>,
) -> Result<FlapSignon, ConnError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_signon(&FlapSignon::version_1().to_bytes()).await?;
    let frame = reader.read_frame().await?;
    if frame.frame_type != FrameType::Signon {
        return Err(ConnError::ProtocolViolation(
            "expected signon frame".to_string(),
        ));
    }
    Ok(FlapSignon::decode(&frame.payload)?)
}

/// The ONLINE-state select loop shared by BOS and CHAT connections.
async fn run_session_loop<R, W>(
    reader: FlapReader<ReadHalf<R>>,
    mut writer: FlapWriter<WriteHalf<W>>,
    session: &Arc<Session>,
    router: ConnectionRouter,
    options: ConnOptions,
) -> Result<(), ConnError>
where
    R: AsyncRead + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let mut mailbox = session.take_mailbox().ok_or(ConnError::SessionBusy)?;
    let mut incoming = spawn_reader(reader);

    loop {
        tokio::select! {
            frame = incoming.recv() => {
                let Some(frame) = frame else {
                    debug!("reader task ended");
                    return Ok(());
                };
                let flap = match frame {
                    Ok(flap) => flap,
                    Err(WireError::Io(_)) => return Ok(()), // client EOF
                    Err(e) => return Err(e.into()),
                };
                match flap.frame_type {
                    FrameType::KeepAlive => {}
                    FrameType::Signoff => return Ok(()),
                    FrameType::Data => {
                        handle_data(&flap, session, &router, &mut writer, options).await?;
                    }
                    other => {
                        return Err(ConnError::ProtocolViolation(format!(
                            "unexpected frame type {other:?} while online"
                        )));
                    }
                }
            }
            msg = mailbox.recv() => {
                let Some(msg) = msg else { return Ok(()); };
                write_snac(0, &msg, &mut writer).await?;
            }
            () = session.closed() => {
                // Server-side signoff: replaced login or slow-consumer
                // ejection.
                let _ = writer.write_signoff().await;
                return Ok(());
            }
        }
    }
}

/// Route one `Data` frame and write whatever comes back.
async fn handle_data<W>(
    flap: &FlapFrame,
    session: &Arc<Session>,
    router: &ConnectionRouter,
    writer: &mut FlapWriter<W>,
    options: ConnOptions,
) -> Result<(), ConnError>
where
    W: AsyncWrite + Unpin,
{
    let mut r = Reader::new(&flap.payload);
    let frame = SnacFrame::decode(&mut r)?;
    let body = r.rest();

    match router.route(session, frame, body).await {
        Ok(replies) => {
            for reply in replies {
                write_snac(frame.request_id, &reply, writer).await?;
            }
            Ok(())
        }
        Err(
            e @ (ServiceError::UnsupportedFoodGroup(_) | ServiceError::UnsupportedSubGroup { .. }),
        ) => {
            if options.fail_fast {
                error!(error = %e, "unsupported snac with fail-fast enabled, terminating");
                std::process::exit(1);
            }
            warn!(error = %e, "unsupported snac");
            write_snac(
                frame.request_id,
                &error_message(frame.food_group, errcode::INVALID_SNAC),
                writer,
            )
            .await?;
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "handler failure, tearing down connection");
            Err(e.into())
        }
    }
}

/// Spawn the auxiliary reader task: it parses FLAP envelopes into a
/// channel until EOF or error, then terminates.
fn spawn_reader<R>(mut reader: FlapReader<ReadHalf<R>>) -> mpsc::Receiver<Result<FlapFrame, WireError>>
where
    R: AsyncRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            match reader.read_frame().await {
                Ok(frame) => {
                    let stop = frame.frame_type == FrameType::Signoff;
                    if tx.send(Ok(frame)).await.is_err() || stop {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
    });
    rx
}
