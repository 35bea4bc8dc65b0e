//! Locate profile query functions.

use rusqlite::Connection;

use oscard_types::ScreenName;

use crate::{Result, StoreError};

/// Upsert a user's profile text.
pub fn set(conn: &Connection, owner: &ScreenName, profile: &str, updated_at: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (identifier, profile, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(identifier) DO UPDATE SET
             profile = excluded.profile,
             updated_at = excluded.updated_at",
        rusqlite::params![owner.identifier(), profile, updated_at as i64],
    )?;
    Ok(())
}

/// Get a user's profile text, if one has been set.
pub fn get(conn: &Connection, owner: &ScreenName) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT profile FROM profiles WHERE identifier = ?1",
        [owner.identifier()],
        |row| row.get::<_, String>(0),
    ) {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        let alice = ScreenName::new("alice");
        set(&conn, &alice, "hi there", 1000).expect("set");
        assert_eq!(get(&conn, &alice).expect("get").as_deref(), Some("hi there"));
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = test_db();
        let alice = ScreenName::new("Al Ice");
        set(&conn, &alice, "v1", 1000).expect("set");
        set(&conn, &ScreenName::new("alice"), "v2", 2000).expect("update");
        assert_eq!(get(&conn, &alice).expect("get").as_deref(), Some("v2"));
    }

    #[test]
    fn test_missing_profile_is_none() {
        let conn = test_db();
        assert_eq!(get(&conn, &ScreenName::new("ghost")).expect("get"), None);
    }
}
