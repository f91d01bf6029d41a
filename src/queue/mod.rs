//! Durable resume queue of pending shares and files
//!
//! Every phase hands work to the next one through this store, so any phase
//! can be restarted against the same database file. Shares are written by
//! discovery and only read afterwards; file records are written by the tree
//! walker and deleted by the scan unit once the file has been classified.
//!
//! Upserts are single `INSERT OR IGNORE` statements against a `UNIQUE` path
//! column, so concurrent discoveries of one path never produce two rows.

pub mod schema;

use crate::rules::Triage;
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub id: i64,
    pub path: String,
    pub description: Option<String>,
    pub triage: Triage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone)]
pub struct QueueStore {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("location", &self.location)
            .finish()
    }
}

impl QueueStore {
    /// Open (or create) the queue database at `path`, resuming any existing state
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open queue database {}", path.display()))?;
        schema::initialize(&conn)
            .with_context(|| format!("Failed to initialize queue database {}", path.display()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory queue")?;
        schema::initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: ":memory:".to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Queue database lock poisoned"))
    }

    /// Insert a share unless its path is already queued; true when a row was added
    pub fn upsert_share(
        &self,
        path: &str,
        description: Option<&str>,
        triage: Triage,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                schema::INSERT_SHARE,
                params![path, description, triage.score()],
            )
            .with_context(|| format!("Failed to queue share {path}"))?;
        Ok(inserted > 0)
    }

    /// Insert a file unless its path is already queued; true when a row was added
    pub fn upsert_file(&self, path: &Path, size: u64) -> Result<bool> {
        let path_text = path
            .to_str()
            .with_context(|| format!("Can't queue {}: path is not valid UTF-8", path.display()))?;
        let size = i64::try_from(size).context("File size exceeds queue range")?;

        let conn = self.lock()?;
        let inserted = conn
            .execute(schema::INSERT_FILE, params![path_text, size])
            .with_context(|| format!("Failed to queue file {path_text}"))?;
        Ok(inserted > 0)
    }

    pub fn list_shares(&self) -> Result<Vec<ShareRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(schema::SELECT_SHARES)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut shares = Vec::new();
        for row in rows {
            let (id, path, description, score) = row.context("Failed to read share row")?;
            shares.push(ShareRecord {
                id,
                path,
                description,
                triage: Triage::from_score(score).unwrap_or_default(),
            });
        }
        Ok(shares)
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(schema::SELECT_FILES)?;
        let rows = stmt.query_map([], |row| {
            Ok(FileRecord {
                id: row.get(0)?,
                path: PathBuf::from(row.get::<_, String>(1)?),
                size: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read file rows")
    }

    /// Remove a classified file record; true when the record existed
    pub fn delete_file(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(schema::DELETE_FILE, params![id])
            .with_context(|| format!("Failed to delete file record {id}"))?;
        Ok(deleted > 0)
    }

    pub fn share_count(&self) -> Result<u64> {
        self.count(schema::COUNT_SHARES)
    }

    pub fn file_count(&self) -> Result<u64> {
        self.count(schema::COUNT_FILES)
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let conn = self.lock()?;
        let count: Option<i64> = conn
            .query_row(sql, [], |row| row.get(0))
            .optional()
            .context("Failed to count queue rows")?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}
