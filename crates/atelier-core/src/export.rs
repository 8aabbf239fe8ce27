//! Export staging: write a work's files to their destination directory and
//! flip the work to `exported`.
//!
//! Writes go through the [`FileWriter`] seam one file at a time, in
//! insertion order. The first failure aborts the run and surfaces which
//! file failed; files already written stay on disk — there is no rollback.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AtelierError, Result};
use crate::types::{Work, WorkType};
use crate::work::WorkStore;

// ---------------------------------------------------------------------------
// FileWriter
// ---------------------------------------------------------------------------

/// Result of a single file write. A failed write carries a human-readable
/// reason instead of a typed error so the staging loop can report it
/// verbatim.
pub struct WriteOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn ok() -> Self {
        WriteOutcome {
            success: true,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        WriteOutcome {
            success: false,
            error: Some(reason.into()),
        }
    }
}

/// Filesystem seam for the export loop.
pub trait FileWriter {
    fn write(&self, path: &Path, content: &str) -> WriteOutcome;
}

/// The real writer: creates parent directories as needed.
pub struct FsWriter;

impl FileWriter for FsWriter {
    fn write(&self, path: &Path, content: &str) -> WriteOutcome {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return WriteOutcome::failed(e.to_string());
            }
        }
        match fs::write(path, content) {
            Ok(()) => WriteOutcome::ok(),
            Err(e) => WriteOutcome::failed(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Destination layout
// ---------------------------------------------------------------------------

fn type_dir(work_type: WorkType) -> &'static str {
    match work_type {
        WorkType::Skill => "skills",
        WorkType::Agent => "agents",
        WorkType::Orchestration => "orchestrations",
    }
}

/// Default destination: `~/.claude/<skills|agents|orchestrations>/<name>`.
pub fn export_base_dir(work: &Work) -> Result<PathBuf> {
    let home = home::home_dir().ok_or(AtelierError::HomeNotFound)?;
    Ok(home
        .join(".claude")
        .join(type_dir(work.work_type))
        .join(&work.name))
}

// ---------------------------------------------------------------------------
// export_work
// ---------------------------------------------------------------------------

/// Write every staged file for a work, preferring the edited buffer over
/// the original, then mark the work exported.
///
/// `dest_override` replaces the default home-relative destination (used by
/// tests and the `--dest` flag). Returns the destination directory.
pub fn export_work(
    works: &WorkStore,
    writer: &dyn FileWriter,
    work_id: i64,
    dest_override: Option<&Path>,
) -> Result<PathBuf> {
    let work = works
        .get(work_id)?
        .ok_or(AtelierError::WorkNotFound(work_id))?;
    let dest = match dest_override {
        Some(d) => d.to_path_buf(),
        None => export_base_dir(&work)?,
    };

    let files = works.files_for_work(work_id)?;
    for file in &files {
        let target = dest.join(&file.file_path);
        let content = file
            .edited_content
            .as_deref()
            .unwrap_or(&file.original_content);
        let outcome = writer.write(&target, content);
        if !outcome.success {
            return Err(AtelierError::Export {
                path: target.display().to_string(),
                reason: outcome.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        debug!(path = %target.display(), "file exported");
    }

    let dest_str = dest.display().to_string();
    works.mark_exported(work_id, &dest_str)?;
    info!(work_id, dest = %dest_str, files = files.len(), "work exported");
    Ok(dest)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::types::WorkStatus;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn staged_work(db: &Database, files: &[(&str, &str)]) -> i64 {
        let work = db.works().create("my-skill", WorkType::Skill, None).unwrap();
        for (path, content) in files {
            db.works().add_file(work.id, path, content).unwrap();
        }
        work.id
    }

    #[test]
    fn exports_all_files_and_marks_exported() {
        let db = Database::open_in_memory().unwrap();
        let work_id = staged_work(&db, &[("SKILL.md", "body"), ("notes/extra.md", "more")]);
        let dir = TempDir::new().unwrap();

        let dest = export_work(&db.works(), &FsWriter, work_id, Some(dir.path())).unwrap();

        assert_eq!(dest, dir.path());
        assert_eq!(fs::read_to_string(dir.path().join("SKILL.md")).unwrap(), "body");
        assert_eq!(
            fs::read_to_string(dir.path().join("notes/extra.md")).unwrap(),
            "more"
        );

        let work = db.works().get(work_id).unwrap().unwrap();
        assert_eq!(work.status, WorkStatus::Exported);
        assert_eq!(work.export_path.as_deref(), Some(dir.path().to_str().unwrap()));
    }

    #[test]
    fn edited_content_wins_over_original() {
        let db = Database::open_in_memory().unwrap();
        let work_id = staged_work(&db, &[("SKILL.md", "original")]);
        let files = db.works().files_for_work(work_id).unwrap();
        db.works()
            .update_file_content(files[0].id, Some("edited"))
            .unwrap();
        let dir = TempDir::new().unwrap();

        export_work(&db.works(), &FsWriter, work_id, Some(dir.path())).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("SKILL.md")).unwrap(),
            "edited"
        );
    }

    /// Fails on the nth write, records every path it was asked to touch.
    struct FailingWriter {
        fail_at: usize,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl FileWriter for FailingWriter {
        fn write(&self, path: &Path, _content: &str) -> WriteOutcome {
            let mut seen = self.seen.borrow_mut();
            seen.push(path.to_path_buf());
            if seen.len() == self.fail_at {
                WriteOutcome::failed("disk full")
            } else {
                WriteOutcome::ok()
            }
        }
    }

    #[test]
    fn first_failure_aborts_without_touching_later_files() {
        // A failure on the kth file leaves earlier files written, never
        // attempts later ones, and the work stays un-exported.
        let db = Database::open_in_memory().unwrap();
        let work_id = staged_work(&db, &[("a.md", "1"), ("b.md", "2"), ("c.md", "3")]);
        let writer = FailingWriter {
            fail_at: 2,
            seen: RefCell::new(Vec::new()),
        };

        let result = export_work(&db.works(), &writer, work_id, Some(Path::new("/dest")));
        let err = result.unwrap_err();
        match err {
            AtelierError::Export { path, reason } => {
                assert!(path.ends_with("b.md"), "{path}");
                assert_eq!(reason, "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // a.md was attempted, c.md never was.
        let seen = writer.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].ends_with("a.md"));

        let work = db.works().get(work_id).unwrap().unwrap();
        assert_eq!(work.status, WorkStatus::Draft);
        assert!(work.export_path.is_none());
    }

    #[test]
    fn export_missing_work_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = export_work(&db.works(), &FsWriter, 77, Some(Path::new("/dest")));
        assert!(matches!(result, Err(AtelierError::WorkNotFound(77))));
    }

    #[test]
    fn export_with_no_files_still_marks_exported() {
        let db = Database::open_in_memory().unwrap();
        let work_id = staged_work(&db, &[]);
        let dir = TempDir::new().unwrap();

        export_work(&db.works(), &FsWriter, work_id, Some(dir.path())).unwrap();
        let work = db.works().get(work_id).unwrap().unwrap();
        assert_eq!(work.status, WorkStatus::Exported);
    }

    #[test]
    fn base_dir_follows_work_type() {
        for (work_type, dir) in [
            (WorkType::Skill, "skills"),
            (WorkType::Agent, "agents"),
            (WorkType::Orchestration, "orchestrations"),
        ] {
            let work = Work {
                id: 1,
                name: "thing".into(),
                work_type,
                status: WorkStatus::Draft,
                base_pattern_id: None,
                export_path: None,
                created_at: String::new(),
                updated_at: String::new(),
            };
            let base = export_base_dir(&work).unwrap();
            assert!(base.ends_with(format!(".claude/{dir}/thing")), "{base:?}");
        }
    }
}
