//! Alert (0x0018) — mail-alert capability negotiation.
//!
//! Period clients announce their alert capabilities at sign-on; the server
//! has no mail service, so the notifications are swallowed.

use oscard_wire::snac::SnacMessage;

/// Alert handler.
pub struct AlertHandler;

impl AlertHandler {
    /// `NotifyCapabilities` / `NotifyDisplayCapabilities` — silent acks.
    pub fn notify(&self) -> Vec<SnacMessage> {
        Vec::new()
    }
}
