//! SQLite layout of the resume queue

use anyhow::{Context, Result};
use rusqlite::Connection;

const CREATE_SHARES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS shares (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    description TEXT,
    triage INTEGER NOT NULL DEFAULT 0
)
"#;

const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL
)
"#;

/// WAL lets readers of the shares table run while walkers insert files
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;
"#;

pub const INSERT_SHARE: &str =
    "INSERT OR IGNORE INTO shares (path, description, triage) VALUES (?1, ?2, ?3)";
pub const INSERT_FILE: &str = "INSERT OR IGNORE INTO files (path, size) VALUES (?1, ?2)";
pub const SELECT_SHARES: &str = "SELECT id, path, description, triage FROM shares ORDER BY id";
pub const SELECT_FILES: &str = "SELECT id, path, size FROM files ORDER BY id";
pub const DELETE_FILE: &str = "DELETE FROM files WHERE id = ?1";
pub const COUNT_SHARES: &str = "SELECT COUNT(*) FROM shares";
pub const COUNT_FILES: &str = "SELECT COUNT(*) FROM files";

/// Apply pragmas and create any missing tables
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(PRAGMAS)
        .context("Failed to configure queue database")?;
    conn.execute(CREATE_SHARES_TABLE, [])
        .context("Failed to create shares table")?;
    conn.execute(CREATE_FILES_TABLE, [])
        .context("Failed to create files table")?;
    Ok(())
}
