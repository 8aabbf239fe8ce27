use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{lock, now, text_col};
use crate::error::{AtelierError, Result};
use crate::types::{Pattern, WorkType};

// ---------------------------------------------------------------------------
// PatternStore
// ---------------------------------------------------------------------------

/// Parameterized CRUD over `patterns`. Tags are stored as a JSON array in
/// one text column.
pub struct PatternStore {
    conn: Arc<Mutex<Connection>>,
}

const PATTERN_COLS: &str = "id, name, pattern_type, description, tags, created_at, updated_at";

fn map_pattern(row: &Row<'_>) -> rusqlite::Result<Pattern> {
    let tags_raw: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Pattern {
        id: row.get(0)?,
        name: row.get(1)?,
        pattern_type: text_col(2, row.get::<_, String>(2)?)?,
        description: row.get(3)?,
        tags,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl PatternStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        PatternStore { conn }
    }

    pub fn create(
        &self,
        name: &str,
        pattern_type: WorkType,
        description: &str,
        tags: &[String],
    ) -> Result<Pattern> {
        let tags_json = serde_json::to_string(tags)?;
        let conn = lock(&self.conn);
        let ts = now();
        conn.execute(
            "INSERT INTO patterns (name, pattern_type, description, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![name, pattern_type.to_string(), description, tags_json, ts],
        )?;
        let id = conn.last_insert_rowid();
        let pattern = conn.query_row(
            &format!("SELECT {PATTERN_COLS} FROM patterns WHERE id = ?1"),
            [id],
            map_pattern,
        )?;
        Ok(pattern)
    }

    pub fn get(&self, id: i64) -> Result<Option<Pattern>> {
        let conn = lock(&self.conn);
        let pattern = conn
            .query_row(
                &format!("SELECT {PATTERN_COLS} FROM patterns WHERE id = ?1"),
                [id],
                map_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    pub fn list(&self) -> Result<Vec<Pattern>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(&format!("SELECT {PATTERN_COLS} FROM patterns ORDER BY id"))?;
        let patterns = stmt
            .query_map([], map_pattern)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(patterns)
    }

    pub fn update(&self, id: i64, description: &str, tags: &[String]) -> Result<Pattern> {
        let tags_json = serde_json::to_string(tags)?;
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE patterns SET description = ?1, tags = ?2, updated_at = ?3 WHERE id = ?4",
            params![description, tags_json, now(), id],
        )?;
        if changed == 0 {
            return Err(AtelierError::PatternNotFound(id));
        }
        let pattern = conn.query_row(
            &format!("SELECT {PATTERN_COLS} FROM patterns WHERE id = ?1"),
            [id],
            map_pattern,
        )?;
        Ok(pattern)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = lock(&self.conn);
        let changed = conn.execute("DELETE FROM patterns WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn create_get_roundtrip_with_tags() {
        let db = Database::open_in_memory().unwrap();
        let tags = vec!["review".to_string(), "rust".to_string()];
        let pattern = db
            .patterns()
            .create("pr-reviewer", WorkType::Agent, "Reviews pull requests", &tags)
            .unwrap();

        let loaded = db.patterns().get(pattern.id).unwrap().unwrap();
        assert_eq!(loaded.name, "pr-reviewer");
        assert_eq!(loaded.pattern_type, WorkType::Agent);
        assert_eq!(loaded.tags, tags);
    }

    #[test]
    fn update_replaces_description_and_tags() {
        let db = Database::open_in_memory().unwrap();
        let pattern = db
            .patterns()
            .create("p", WorkType::Skill, "old", &[])
            .unwrap();
        let updated = db
            .patterns()
            .update(pattern.id, "new", &["a".to_string()])
            .unwrap();
        assert_eq!(updated.description, "new");
        assert_eq!(updated.tags, vec!["a"]);
    }

    #[test]
    fn update_missing_pattern_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.patterns().update(7, "x", &[]),
            Err(AtelierError::PatternNotFound(7))
        ));
    }

    #[test]
    fn delete_then_get_returns_none() {
        let db = Database::open_in_memory().unwrap();
        let pattern = db
            .patterns()
            .create("p", WorkType::Orchestration, "", &[])
            .unwrap();
        assert!(db.patterns().delete(pattern.id).unwrap());
        assert!(db.patterns().get(pattern.id).unwrap().is_none());
    }
}
