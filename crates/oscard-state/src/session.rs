//! Per-connected-user session state.
//!
//! A session owns a bounded outbound mailbox. Producers anywhere in the
//! process (other connections' handlers, presence fan-out) enqueue with a
//! bounded wait; the single consumer is the session's connection loop,
//! which drains messages onto the wire in enqueue order. Backpressure is
//! load-shedding: a mailbox that stays full past the send timeout marks
//! the consumer slow, and the manager closes the session.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use oscard_types::ScreenName;
use oscard_wire::snac::SnacMessage;
use oscard_wire::userinfo::{TlvUserInfo, USER_FLAG_NORMAL, USER_FLAG_UNAVAILABLE};

use crate::now_unix;

/// Warning-level ceiling, tenths of a percent (1000 = 100.0%).
pub const WARNING_CAP: u16 = 1000;

/// Mailbox and timeout tuning for new sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound mailbox capacity.
    pub mailbox_capacity: usize,
    /// How long an enqueue may wait on a full mailbox before the consumer
    /// is declared slow.
    pub send_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            send_timeout: Duration::from_secs(2),
        }
    }
}

/// Outcome of a mailbox enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Queued for delivery.
    Sent,
    /// Mailbox stayed full for the whole send timeout.
    QueueFull,
    /// The session is closed; nothing was queued.
    Closed,
}

/// Mutable per-session attributes, guarded by one mutex.
#[derive(Debug)]
struct SessionState {
    warning: u16,
    away_message: String,
    invisible: bool,
    idle_since: Option<u64>,
    user_flags: u16,
}

/// One connected user.
#[derive(Debug)]
pub struct Session {
    id: String,
    screen_name: ScreenName,
    signon_time: u64,
    tx: mpsc::Sender<SnacMessage>,
    mailbox: Mutex<Option<mpsc::Receiver<SnacMessage>>>,
    closed_tx: watch::Sender<bool>,
    send_timeout: Duration,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session with the given identity.
    pub fn new(id: impl Into<String>, screen_name: ScreenName, config: &SessionConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let (closed_tx, _) = watch::channel(false);
        Self {
            id: id.into(),
            screen_name,
            signon_time: now_unix(),
            tx,
            mailbox: Mutex::new(Some(rx)),
            closed_tx,
            send_timeout: config.send_timeout,
            state: Mutex::new(SessionState {
                warning: 0,
                away_message: String::new(),
                invisible: false,
                idle_since: None,
                user_flags: USER_FLAG_NORMAL,
            }),
        }
    }

    /// The session id (the BOS login cookie).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session's screen name.
    pub fn screen_name(&self) -> &ScreenName {
        &self.screen_name
    }

    /// Sign-on time, unix seconds.
    pub fn signon_time(&self) -> u64 {
        self.signon_time
    }

    /// Enqueue an outbound message with a bounded wait.
    pub async fn send_message(&self, msg: SnacMessage) -> SendResult {
        if self.is_closed() {
            return SendResult::Closed;
        }
        match tokio::time::timeout(self.send_timeout, self.tx.send(msg)).await {
            Ok(Ok(())) => SendResult::Sent,
            Ok(Err(_)) => SendResult::Closed,
            Err(_) => SendResult::QueueFull,
        }
    }

    /// Claim the mailbox receiver. The connection loop calls this once;
    /// later calls return `None`.
    pub fn take_mailbox(&self) -> Option<mpsc::Receiver<SnacMessage>> {
        self.mailbox
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
    }

    /// Close the session. Idempotent. Queued deliveries are dropped by the
    /// exiting consumer; later sends observe [`SendResult::Closed`].
    pub fn close(&self) {
        self.closed_tx.send_replace(true);
    }

    /// True once [`Session::close`] has run.
    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Resolves when the session is closed; immediately if it already is.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Current warning level.
    pub fn warning(&self) -> u16 {
        self.state.lock().map(|s| s.warning).unwrap_or(0)
    }

    /// Raise the warning level by `delta`, capped. Returns
    /// `(applied, new_level)`.
    pub fn incr_warning(&self, delta: u16) -> (u16, u16) {
        let Ok(mut s) = self.state.lock() else {
            return (0, 0);
        };
        let new = s.warning.saturating_add(delta).min(WARNING_CAP);
        let applied = new - s.warning;
        s.warning = new;
        (applied, new)
    }

    /// Current away message; empty when available.
    pub fn away_message(&self) -> String {
        self.state
            .lock()
            .map(|s| s.away_message.clone())
            .unwrap_or_default()
    }

    /// Set or clear (empty string) the away message.
    pub fn set_away_message(&self, msg: impl Into<String>) {
        if let Ok(mut s) = self.state.lock() {
            s.away_message = msg.into();
        }
    }

    /// Invisible flag.
    pub fn invisible(&self) -> bool {
        self.state.lock().map(|s| s.invisible).unwrap_or(false)
    }

    /// Set the invisible flag.
    pub fn set_invisible(&self, invisible: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.invisible = invisible;
        }
    }

    /// Mark idle since `idle_seconds` ago.
    pub fn set_idle(&self, idle_seconds: u32) {
        if let Ok(mut s) = self.state.lock() {
            s.idle_since = Some(now_unix().saturating_sub(u64::from(idle_seconds)));
        }
    }

    /// Clear idle state.
    pub fn clear_idle(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.idle_since = None;
        }
    }

    /// User-class flags bitmask.
    pub fn user_flags(&self) -> u16 {
        self.state
            .lock()
            .map(|s| s.user_flags)
            .unwrap_or(USER_FLAG_NORMAL)
    }

    /// Replace the user-class flags bitmask.
    pub fn set_user_flags(&self, flags: u16) {
        if let Ok(mut s) = self.state.lock() {
            s.user_flags = flags;
        }
    }

    /// Snapshot the session as a wire user-info block.
    pub fn tlv_user_info(&self) -> TlvUserInfo {
        let (warning, away, idle_since, flags) = self
            .state
            .lock()
            .map(|s| (s.warning, !s.away_message.is_empty(), s.idle_since, s.user_flags))
            .unwrap_or((0, false, None, USER_FLAG_NORMAL));

        let flags = if away {
            flags | USER_FLAG_UNAVAILABLE
        } else {
            flags
        };
        let idle_minutes = idle_since.map(|t| (now_unix().saturating_sub(t) / 60) as u32);

        TlvUserInfo::new(
            self.screen_name.as_str(),
            warning,
            flags,
            self.signon_time as u32,
            idle_minutes,
        )
    }
}
