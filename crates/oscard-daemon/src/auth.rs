//! The BUCP sign-on service (AUTH listener).
//!
//! Three-phase exchange inside one TCP connection:
//!
//! 1. FLAP signon frames in both directions (version 1, sequence counter
//!    starts at 100)
//! 2. `ChallengeRequest` → the account's auth key
//! 3. `LoginRequest` (MD5 digest) → either the BOS redirect plus an
//!    authorization cookie, or error subcode 0x01
//!
//! A successful login mints the session in the BOS manager before the
//! reply goes out, so the cookie is redeemable the moment the client sees
//! it. With auth disabled, unknown screen names are provisioned on the
//! fly and any digest is accepted for them.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use oscard_service::ServerContext;
use oscard_state::random_cookie;
use oscard_store::queries::users;
use oscard_store::StoreError;
use oscard_types::{ScreenName, User};
use oscard_wire::flap::{FlapReader, FlapWriter, FrameType};
use oscard_wire::messages::{auth_tags, BucpChallengeResponse, BucpLoginResponse, BucpRequest, FlapSignon};
use oscard_wire::snac::{bucp, foodgroup, write_snac, SnacFrame, SnacMessage};
use oscard_wire::tlv::Tlv;
use oscard_wire::WireError;

use crate::connection::ConnError;

/// AUTH connections number their frames from 100.
const AUTH_START_SEQUENCE: u16 = 100;

/// The BUCP sign-on service.
pub struct AuthService {
    ctx: Arc<ServerContext>,
    disable_auth: bool,
}

impl AuthService {
    /// Build the service over the shared context.
    pub fn new(ctx: Arc<ServerContext>, disable_auth: bool) -> Self {
        Self { ctx, disable_auth }
    }

    /// Drive one AUTH connection to completion.
    pub async fn handle_connection<S>(&self, stream: S) -> Result<(), ConnError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (r, w) = tokio::io::split(stream);
        let mut reader = FlapReader::new(r);
        let mut writer = FlapWriter::new(w, AUTH_START_SEQUENCE);

        writer.write_signon(&FlapSignon::version_1().to_bytes()).await?;
        let signon = reader.read_frame().await?;
        if signon.frame_type != FrameType::Signon {
            return Err(ConnError::ProtocolViolation(
                "expected signon frame".to_string(),
            ));
        }

        loop {
            let frame = match reader.read_frame().await {
                Ok(frame) => frame,
                // Client closed without a signoff; normal for period
                // clients.
                Err(WireError::Io(_)) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            match frame.frame_type {
                FrameType::KeepAlive => continue,
                FrameType::Signoff => return Ok(()),
                FrameType::Data => {
                    let mut r = oscard_wire::codec::Reader::new(&frame.payload);
                    let snac = SnacFrame::decode(&mut r)?;
                    let body = r.rest();
                    let reply = match (snac.food_group, snac.sub_group) {
                        (foodgroup::BUCP, bucp::CHALLENGE_REQUEST) => {
                            self.challenge(body).await?
                        }
                        (foodgroup::BUCP, bucp::LOGIN_REQUEST) => self.login(body).await?,
                        (fg, sg) => {
                            debug!(food_group = fg, sub_group = sg, "ignoring non-BUCP snac on auth connection");
                            continue;
                        }
                    };
                    write_snac(snac.request_id, &reply, &mut writer).await?;
                }
                other => {
                    return Err(ConnError::ProtocolViolation(format!(
                        "unexpected frame type {other:?} during sign-on"
                    )));
                }
            }
        }
    }

    /// Phase two: hand out the challenge key.
    pub async fn challenge(&self, body: &[u8]) -> Result<SnacMessage, ConnError> {
        let request = BucpRequest::decode(body)?;
        let Some(name) = request.screen_name() else {
            return Ok(login_failure(""));
        };
        let screen_name = ScreenName::new(name.as_str());

        let lookup = {
            let conn = self.ctx.db.lock().await;
            users::get(&conn, &screen_name)
        };
        let auth_key = match lookup {
            Ok(user) => user.auth_key,
            Err(StoreError::NotFound(_)) if self.disable_auth => random_cookie(),
            Err(StoreError::NotFound(_)) => {
                debug!(screen_name = %screen_name, "challenge for unknown screen name");
                return Ok(login_failure(&name));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SnacMessage::new(
            SnacFrame::new(foodgroup::BUCP, bucp::CHALLENGE_RESPONSE),
            BucpChallengeResponse { auth_key }.to_bytes(),
        ))
    }

    /// Phase three: check the digest and issue the BOS cookie.
    pub async fn login(&self, body: &[u8]) -> Result<SnacMessage, ConnError> {
        let request = BucpRequest::decode(body)?;
        let Some(name) = request.screen_name() else {
            return Ok(login_failure(""));
        };
        let screen_name = ScreenName::new(name.as_str());
        let digest = request.password_hash().unwrap_or_default();

        let lookup = {
            let conn = self.ctx.db.lock().await;
            users::get(&conn, &screen_name)
        };
        let authenticated = match lookup {
            Ok(user) => user.verify_digest(digest),
            Err(StoreError::NotFound(_)) if self.disable_auth => {
                info!(screen_name = %screen_name, "provisioning stub user");
                let user = User::new_with_password(screen_name.clone(), random_cookie(), "");
                let conn = self.ctx.db.lock().await;
                users::insert(&conn, &user, now_unix())?;
                true
            }
            Err(StoreError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };

        if !authenticated {
            warn!(screen_name = %screen_name, "login failed");
            return Ok(login_failure(&name));
        }

        let session_id = random_cookie();
        self.ctx
            .sessions
            .new_session(session_id.clone(), screen_name.clone());
        info!(screen_name = %screen_name, "login succeeded");

        let mut response = BucpLoginResponse::default();
        response
            .tlvs
            .push(Tlv::string(auth_tags::SCREEN_NAME, &name));
        response.tlvs.push(Tlv::string(
            auth_tags::RECONNECT_HERE,
            &self.ctx.bos_address(),
        ));
        response
            .tlvs
            .push(Tlv::new(auth_tags::AUTH_COOKIE, session_id.into_bytes()));
        Ok(SnacMessage::new(
            SnacFrame::new(foodgroup::BUCP, bucp::LOGIN_RESPONSE),
            response.to_bytes(),
        ))
    }
}

/// A login response carrying error subcode 0x01 (bad name or password).
fn login_failure(screen_name: &str) -> SnacMessage {
    let mut response = BucpLoginResponse::default();
    if !screen_name.is_empty() {
        response
            .tlvs
            .push(Tlv::string(auth_tags::SCREEN_NAME, screen_name));
    }
    response.tlvs.push(Tlv::u16(auth_tags::ERROR_SUBCODE, 0x01));
    SnacMessage::new(
        SnacFrame::new(foodgroup::BUCP, bucp::LOGIN_RESPONSE),
        response.to_bytes(),
    )
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
