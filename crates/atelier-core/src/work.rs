use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{lock, now, text_col};
use crate::error::{AtelierError, Result};
use crate::types::{Work, WorkFile, WorkStatus, WorkType};

// ---------------------------------------------------------------------------
// WorkStore
// ---------------------------------------------------------------------------

/// Parameterized CRUD over `works` and `work_files`.
pub struct WorkStore {
    conn: Arc<Mutex<Connection>>,
}

const WORK_COLS: &str =
    "id, name, work_type, status, base_pattern_id, export_path, created_at, updated_at";

fn map_work(row: &Row<'_>) -> rusqlite::Result<Work> {
    Ok(Work {
        id: row.get(0)?,
        name: row.get(1)?,
        work_type: text_col(2, row.get::<_, String>(2)?)?,
        status: text_col(3, row.get::<_, String>(3)?)?,
        base_pattern_id: row.get(4)?,
        export_path: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_file(row: &Row<'_>) -> rusqlite::Result<WorkFile> {
    Ok(WorkFile {
        id: row.get(0)?,
        work_id: row.get(1)?,
        file_path: row.get(2)?,
        original_content: row.get(3)?,
        edited_content: row.get(4)?,
    })
}

impl WorkStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        WorkStore { conn }
    }

    pub fn create(
        &self,
        name: &str,
        work_type: WorkType,
        base_pattern_id: Option<i64>,
    ) -> Result<Work> {
        let conn = lock(&self.conn);
        let ts = now();
        conn.execute(
            "INSERT INTO works (name, work_type, status, base_pattern_id, created_at, updated_at)
             VALUES (?1, ?2, 'draft', ?3, ?4, ?4)",
            params![name, work_type.to_string(), base_pattern_id, ts],
        )?;
        let id = conn.last_insert_rowid();
        let work = conn.query_row(
            &format!("SELECT {WORK_COLS} FROM works WHERE id = ?1"),
            [id],
            map_work,
        )?;
        Ok(work)
    }

    pub fn get(&self, id: i64) -> Result<Option<Work>> {
        let conn = lock(&self.conn);
        let work = conn
            .query_row(
                &format!("SELECT {WORK_COLS} FROM works WHERE id = ?1"),
                [id],
                map_work,
            )
            .optional()?;
        Ok(work)
    }

    pub fn list(&self) -> Result<Vec<Work>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(&format!("SELECT {WORK_COLS} FROM works ORDER BY id"))?;
        let works = stmt
            .query_map([], map_work)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(works)
    }

    pub fn update_status(&self, id: i64, status: WorkStatus) -> Result<()> {
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE works SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), now(), id],
        )?;
        if changed == 0 {
            return Err(AtelierError::WorkNotFound(id));
        }
        Ok(())
    }

    /// Flip the work to `exported` and persist where it landed.
    pub fn mark_exported(&self, id: i64, export_path: &str) -> Result<()> {
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE works SET status = 'exported', export_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![export_path, now(), id],
        )?;
        if changed == 0 {
            return Err(AtelierError::WorkNotFound(id));
        }
        Ok(())
    }

    /// Delete a work; sessions and files go with it via cascade.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = lock(&self.conn);
        let changed = conn.execute("DELETE FROM works WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Work files
    // -----------------------------------------------------------------------

    pub fn add_file(&self, work_id: i64, file_path: &str, original: &str) -> Result<WorkFile> {
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO work_files (work_id, file_path, original_content) VALUES (?1, ?2, ?3)",
            params![work_id, file_path, original],
        )?;
        let id = conn.last_insert_rowid();
        let file = conn.query_row(
            "SELECT id, work_id, file_path, original_content, edited_content
             FROM work_files WHERE id = ?1",
            [id],
            map_file,
        )?;
        Ok(file)
    }

    /// All files for a work in insertion order.
    pub fn files_for_work(&self, work_id: i64) -> Result<Vec<WorkFile>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(
            "SELECT id, work_id, file_path, original_content, edited_content
             FROM work_files WHERE work_id = ?1 ORDER BY id",
        )?;
        let files = stmt
            .query_map([work_id], map_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Set or clear the edited buffer for a file.
    pub fn update_file_content(&self, file_id: i64, edited: Option<&str>) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute(
            "UPDATE work_files SET edited_content = ?1 WHERE id = ?2",
            params![edited, file_id],
        )?;
        Ok(())
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
    fn create_and_get_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let work = db
            .works()
            .create("code-review", WorkType::Skill, None)
            .unwrap();
        assert_eq!(work.status, WorkStatus::Draft);
        assert!(work.export_path.is_none());

        let loaded = db.works().get(work.id).unwrap().unwrap();
        assert_eq!(loaded.name, "code-review");
        assert_eq!(loaded.work_type, WorkType::Skill);
    }

    #[test]
    fn get_missing_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.works().get(999).unwrap().is_none());
    }

    #[test]
    fn create_with_base_pattern() {
        let db = Database::open_in_memory().unwrap();
        let pattern = db
            .patterns()
            .create("reviewer", WorkType::Agent, "Reviews PRs", &[])
            .unwrap();
        let work = db
            .works()
            .create("my-reviewer", WorkType::Agent, Some(pattern.id))
            .unwrap();
        assert_eq!(work.base_pattern_id, Some(pattern.id));
    }

    #[test]
    fn create_with_dangling_base_pattern_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.works().create("w", WorkType::Skill, Some(12345));
        assert!(matches!(result, Err(AtelierError::Db(_))), "{result:?}");
    }

    #[test]
    fn update_status_missing_work_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.works().update_status(42, WorkStatus::InProgress),
            Err(AtelierError::WorkNotFound(42))
        ));
    }

    #[test]
    fn mark_exported_sets_status_and_path() {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Skill, None).unwrap();
        db.works().mark_exported(work.id, "/tmp/out").unwrap();
        let loaded = db.works().get(work.id).unwrap().unwrap();
        assert_eq!(loaded.status, WorkStatus::Exported);
        assert_eq!(loaded.export_path.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn files_preserve_insertion_order_and_edits() {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Skill, None).unwrap();
        db.works().add_file(work.id, "SKILL.md", "one").unwrap();
        let second = db.works().add_file(work.id, "extra.md", "two").unwrap();
        db.works()
            .update_file_content(second.id, Some("two (edited)"))
            .unwrap();

        let files = db.works().files_for_work(work.id).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_path, "SKILL.md");
        assert!(files[0].edited_content.is_none());
        assert_eq!(files[1].edited_content.as_deref(), Some("two (edited)"));
    }

    #[test]
    fn delete_returns_whether_anything_was_removed() {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Skill, None).unwrap();
        assert!(db.works().delete(work.id).unwrap());
        assert!(!db.works().delete(work.id).unwrap());
    }
}
