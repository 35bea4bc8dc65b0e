//! Buddy (0x0003) — legacy client-side buddy lists.
//!
//! Pre-feedbag clients manage their lists locally and upload them with
//! `AddBuddies`/`DelBuddies`; the server accepts those silently. The
//! server-sent `BuddyArrived`/`BuddyDeparted` notices for this food group
//! are produced by the presence coordinator.

use oscard_wire::messages::buddy_rights_reply;
use oscard_wire::snac::{buddy, foodgroup, SnacFrame, SnacMessage};

/// Buddy handler.
pub struct BuddyHandler;

impl BuddyHandler {
    /// `RightsQuery` — static rights reply.
    pub fn rights_query(&self) -> Vec<SnacMessage> {
        vec![SnacMessage::new(
            SnacFrame::new(foodgroup::BUDDY, buddy::RIGHTS_REPLY),
            buddy_rights_reply(),
        )]
    }

    /// `AddBuddies` / `DelBuddies` — accepted without a reply.
    pub fn edit_buddies(&self) -> Vec<SnacMessage> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rights_reply_shape() {
        let replies = BuddyHandler.rights_query();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.food_group, foodgroup::BUDDY);
        assert_eq!(replies[0].frame.sub_group, buddy::RIGHTS_REPLY);
        assert!(!replies[0].body.is_empty());
    }

    #[test]
    fn test_edits_are_silent() {
        assert!(BuddyHandler.edit_buddies().is_empty());
    }
}
