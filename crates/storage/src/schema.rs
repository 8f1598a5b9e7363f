use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS plans (
    plan_id BLOB PRIMARY KEY CHECK (length(plan_id) = 16),
    version INTEGER NOT NULL CHECK (version > 0),
    name TEXT NOT NULL,
    description TEXT,
    price_amount INTEGER NOT NULL,
    price_currency TEXT NOT NULL,
    duration_months INTEGER NOT NULL,
    benefits BLOB NOT NULL,
    is_active INTEGER NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS plan_branches (
    plan_id BLOB NOT NULL REFERENCES plans (plan_id) ON DELETE CASCADE,
    branch_id TEXT NOT NULL,
    PRIMARY KEY (plan_id, branch_id)
);

CREATE TABLE IF NOT EXISTS plan_overrides (
    plan_id BLOB NOT NULL REFERENCES plans (plan_id) ON DELETE CASCADE,
    branch_id TEXT NOT NULL,
    fields BLOB NOT NULL,
    PRIMARY KEY (plan_id, branch_id)
);
CREATE INDEX IF NOT EXISTS idx_plan_overrides_branch ON plan_overrides (branch_id);
";
