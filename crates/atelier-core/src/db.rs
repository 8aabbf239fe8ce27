//! SQLite-backed persistence.
//!
//! One [`Database`] owns the connection; [`WorkStore`], [`PatternStore`],
//! and [`SessionStore`] share it through an `Arc<Mutex<_>>`. Each store
//! call takes the lock once, so every read-modify-write against the
//! serialized conversation log is internally consistent. The single-writer
//! assumption for a given session id lives above this layer.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::Result;
use crate::pattern::PatternStore;
use crate::session::SessionStore;
use crate::work::WorkStore;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Enum columns carry CHECK constraints so raw SQL can never store a value
/// outside the domain; deleting a work cascades to its sessions and files.
const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS patterns (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    pattern_type  TEXT NOT NULL CHECK (pattern_type IN ('skill', 'agent', 'orchestration')),
    description   TEXT NOT NULL DEFAULT '',
    tags          TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS works (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    work_type       TEXT NOT NULL CHECK (work_type IN ('skill', 'agent', 'orchestration')),
    status          TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'in_progress', 'exported')),
    base_pattern_id INTEGER REFERENCES patterns(id) ON DELETE SET NULL,
    export_path     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS guide_sessions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    work_id          INTEGER NOT NULL REFERENCES works(id) ON DELETE CASCADE,
    current_step     TEXT NOT NULL DEFAULT 'step1' CHECK (current_step IN ('step1', 'step2', 'step3', 'step4', 'step5')),
    conversation_log TEXT NOT NULL DEFAULT '[]',
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS work_files (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    work_id          INTEGER NOT NULL REFERENCES works(id) ON DELETE CASCADE,
    file_path        TEXT NOT NULL,
    original_content TEXT NOT NULL DEFAULT '',
    edited_content   TEXT
);
";

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Open handle to the application database.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// An in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn works(&self) -> WorkStore {
        WorkStore::new(Arc::clone(&self.conn))
    }

    pub fn patterns(&self) -> PatternStore {
        PatternStore::new(Arc::clone(&self.conn))
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(Arc::clone(&self.conn))
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Lock the shared connection, recovering the guard if poisoned.
pub(crate) fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

/// Parse a TEXT column into a domain type, mapping parse failures into a
/// rusqlite conversion error so they surface through the query result.
pub(crate) fn text_col<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Current timestamp in the format all tables use.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkType;
    use tempfile::TempDir;

    #[test]
    fn open_creates_schema_on_disk() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("atelier.db")).unwrap();
        // All stores usable immediately
        assert!(db.works().list().unwrap().is_empty());
        assert!(db.patterns().list().unwrap().is_empty());
    }

    #[test]
    fn open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("atelier.db");
        {
            let db = Database::open(&path).unwrap();
            db.works().create("w", WorkType::Skill, None).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.works().list().unwrap().len(), 1);
    }

    #[test]
    fn deleting_a_work_cascades_to_sessions_and_files() {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Agent, None).unwrap();
        let session = db.sessions().create(work.id).unwrap();
        db.works().add_file(work.id, "SKILL.md", "content").unwrap();

        assert!(db.works().delete(work.id).unwrap());
        assert!(db.sessions().get(session.id).unwrap().is_none());
        assert!(db.works().files_for_work(work.id).unwrap().is_empty());
    }

    #[test]
    fn check_constraint_rejects_out_of_domain_step() {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Skill, None).unwrap();
        let session = db.sessions().create(work.id).unwrap();

        // Bypass the typed API: raw SQL must still be unable to store an
        // invalid step value, and the stored step must be unchanged.
        let conn = lock(&db.conn);
        let result = conn.execute(
            "UPDATE guide_sessions SET current_step = 'step9' WHERE id = ?1",
            [session.id],
        );
        assert!(result.is_err());
        let stored: String = conn
            .query_row(
                "SELECT current_step FROM guide_sessions WHERE id = ?1",
                [session.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, "step1");
    }
}
