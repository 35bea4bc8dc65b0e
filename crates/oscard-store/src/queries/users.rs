//! User-account query functions.

use rusqlite::Connection;

use oscard_types::{ScreenName, User};

use crate::{Result, StoreError};

/// Insert a new user account.
pub fn insert(conn: &Connection, user: &User, created_at: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO users (identifier, screen_name, auth_key, pass_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            user.screen_name.identifier(),
            user.screen_name.as_str(),
            user.auth_key,
            user.pass_hash,
            created_at as i64,
        ],
    )?;
    Ok(())
}

/// Get a user by screen name.
pub fn get(conn: &Connection, screen_name: &ScreenName) -> Result<User> {
    conn.query_row(
        "SELECT screen_name, auth_key, pass_hash FROM users WHERE identifier = ?1",
        [screen_name.identifier()],
        |row| {
            Ok(User {
                screen_name: ScreenName::new(row.get::<_, String>(0)?),
                auth_key: row.get(1)?,
                pass_hash: row.get(2)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("user".into()),
        other => StoreError::Sqlite(other),
    })
}
