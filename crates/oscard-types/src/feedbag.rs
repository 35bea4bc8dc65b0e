//! Feedbag (server-stored buddy list) items.

/// Item class: a buddy entry.
pub const CLASS_BUDDY: u16 = 2;
/// Item class: a deny (block) entry.
pub const CLASS_DENY: u16 = 3;
/// Item class: a permit entry.
pub const CLASS_PERMIT: u16 = 4;

/// One feedbag item.
///
/// The server interprets only the class and name; the TLV block is stored
/// and returned opaquely so clients keep whatever they put there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbagItem {
    /// Target screen name or group name.
    pub name: String,
    /// Group the item belongs to (0 for top-level entries).
    pub group_id: u16,
    /// Item id, unique within (owner, group).
    pub item_id: u16,
    /// Item class (buddy, deny, permit, or any client-defined class).
    pub class_id: u16,
    /// Opaque client TLV data, stored verbatim.
    pub tlvs: Vec<u8>,
}

impl FeedbagItem {
    /// True for classes whose edits affect presence toward the owner.
    pub fn is_presence_class(&self) -> bool {
        self.class_id == CLASS_BUDDY || self.class_id == CLASS_PERMIT
    }

    /// True for deny (block) entries.
    pub fn is_deny(&self) -> bool {
        self.class_id == CLASS_DENY
    }
}

/// Pairwise block relation between two screen names, derived from
/// deny-class feedbag items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedState {
    /// Neither side blocks the other.
    None,
    /// The first name blocks the second.
    ABlockedB,
    /// The second name blocks the first.
    BBlockedA,
    /// Both directions blocked.
    Mutual,
}

impl BlockedState {
    /// True unless the relation is [`BlockedState::None`].
    pub fn is_blocked(self) -> bool {
        !matches!(self, BlockedState::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(class_id: u16) -> FeedbagItem {
        FeedbagItem {
            name: "bob".to_string(),
            group_id: 1,
            item_id: 7,
            class_id,
            tlvs: Vec::new(),
        }
    }

    #[test]
    fn test_class_predicates() {
        assert!(item(CLASS_BUDDY).is_presence_class());
        assert!(item(CLASS_PERMIT).is_presence_class());
        assert!(!item(CLASS_DENY).is_presence_class());
        assert!(item(CLASS_DENY).is_deny());
    }

    #[test]
    fn test_blocked_state() {
        assert!(!BlockedState::None.is_blocked());
        assert!(BlockedState::ABlockedB.is_blocked());
        assert!(BlockedState::Mutual.is_blocked());
    }
}
