//! SQL schema definitions.

/// Complete schema for the oscard v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- User accounts
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    identifier TEXT PRIMARY KEY,
    screen_name TEXT NOT NULL,
    auth_key TEXT NOT NULL,
    pass_hash BLOB NOT NULL,
    created_at INTEGER NOT NULL
);

-- ============================================================
-- Locate profiles
-- ============================================================

CREATE TABLE IF NOT EXISTS profiles (
    identifier TEXT PRIMARY KEY,
    profile TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ============================================================
-- Feedbag (server-stored buddy lists)
-- ============================================================

CREATE TABLE IF NOT EXISTS feedbag (
    owner TEXT NOT NULL,
    group_id INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    class_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    tlvs BLOB NOT NULL,
    PRIMARY KEY (owner, group_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_feedbag_name ON feedbag(name, class_id);

CREATE TABLE IF NOT EXISTS feedbag_meta (
    owner TEXT PRIMARY KEY,
    last_modified INTEGER NOT NULL
);
"#;
