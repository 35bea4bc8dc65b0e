//! Feedbag (server-stored buddy list) query functions.
//!
//! Owners and lookups are keyed by the normalized screen-name identifier;
//! item names are stored as the client sent them and normalized inside the
//! queries that compare them.

use rusqlite::Connection;

use oscard_types::{feedbag::CLASS_BUDDY, feedbag::CLASS_DENY, BlockedState, FeedbagItem, ScreenName};

use crate::Result;

/// All items stored for `owner`.
pub fn retrieve(conn: &Connection, owner: &ScreenName) -> Result<Vec<FeedbagItem>> {
    let mut stmt = conn.prepare(
        "SELECT name, group_id, item_id, class_id, tlvs
         FROM feedbag WHERE owner = ?1
         ORDER BY group_id, item_id",
    )?;

    let items = stmt
        .query_map([owner.identifier()], |row| {
            Ok(FeedbagItem {
                name: row.get(0)?,
                group_id: row.get::<_, i64>(1)? as u16,
                item_id: row.get::<_, i64>(2)? as u16,
                class_id: row.get::<_, i64>(3)? as u16,
                tlvs: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(items)
}

/// When `owner`'s list last changed, unix seconds. 0 for a fresh list.
pub fn last_modified(conn: &Connection, owner: &ScreenName) -> Result<u64> {
    match conn.query_row(
        "SELECT last_modified FROM feedbag_meta WHERE owner = ?1",
        [owner.identifier()],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(t) => Ok(t as u64),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Insert or replace items, bumping the owner's last-modified time.
pub fn upsert(
    conn: &Connection,
    owner: &ScreenName,
    items: &[FeedbagItem],
    now: u64,
) -> Result<()> {
    let ident = owner.identifier();
    let mut stmt = conn.prepare(
        "INSERT INTO feedbag (owner, group_id, item_id, class_id, name, tlvs)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(owner, group_id, item_id) DO UPDATE SET
             class_id = excluded.class_id,
             name = excluded.name,
             tlvs = excluded.tlvs",
    )?;
    for item in items {
        stmt.execute(rusqlite::params![
            ident,
            item.group_id,
            item.item_id,
            item.class_id,
            item.name,
            item.tlvs,
        ])?;
    }
    touch(conn, &ident, now)
}

/// Delete items, bumping the owner's last-modified time.
pub fn delete(
    conn: &Connection,
    owner: &ScreenName,
    items: &[FeedbagItem],
    now: u64,
) -> Result<()> {
    let ident = owner.identifier();
    let mut stmt =
        conn.prepare("DELETE FROM feedbag WHERE owner = ?1 AND group_id = ?2 AND item_id = ?3")?;
    for item in items {
        stmt.execute(rusqlite::params![ident, item.group_id, item.item_id])?;
    }
    touch(conn, &ident, now)
}

/// Screen names `owner` lists as buddies.
pub fn buddies(conn: &Connection, owner: &ScreenName) -> Result<Vec<ScreenName>> {
    let mut stmt =
        conn.prepare("SELECT name FROM feedbag WHERE owner = ?1 AND class_id = ?2 ORDER BY name")?;
    let names = stmt
        .query_map(
            rusqlite::params![owner.identifier(), CLASS_BUDDY],
            |row| row.get::<_, String>(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.into_iter().map(ScreenName::new).collect())
}

/// Screen names that have `user` on their buddy list — the fan-out set for
/// presence changes.
pub fn interested_users(conn: &Connection, user: &ScreenName) -> Result<Vec<ScreenName>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT owner FROM feedbag
         WHERE class_id = ?1 AND REPLACE(LOWER(name), ' ', '') = ?2",
    )?;
    let owners = stmt
        .query_map(rusqlite::params![CLASS_BUDDY, user.identifier()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(owners.into_iter().map(ScreenName::new).collect())
}

/// The pairwise block relation between `a` and `b`, derived from
/// deny-class items.
pub fn blocked(conn: &Connection, a: &ScreenName, b: &ScreenName) -> Result<BlockedState> {
    let a_blocks_b = has_deny(conn, a, b)?;
    let b_blocks_a = has_deny(conn, b, a)?;
    Ok(match (a_blocks_b, b_blocks_a) {
        (false, false) => BlockedState::None,
        (true, false) => BlockedState::ABlockedB,
        (false, true) => BlockedState::BBlockedA,
        (true, true) => BlockedState::Mutual,
    })
}

fn has_deny(conn: &Connection, owner: &ScreenName, target: &ScreenName) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM feedbag
         WHERE owner = ?1 AND class_id = ?2 AND REPLACE(LOWER(name), ' ', '') = ?3",
        rusqlite::params![owner.identifier(), CLASS_DENY, target.identifier()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn touch(conn: &Connection, ident: &str, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO feedbag_meta (owner, last_modified) VALUES (?1, ?2)
         ON CONFLICT(owner) DO UPDATE SET last_modified = excluded.last_modified",
        rusqlite::params![ident, now as i64],
    )?;
    Ok(())
}
