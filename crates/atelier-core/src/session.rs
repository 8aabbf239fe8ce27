//! Guide session persistence.
//!
//! One row per authoring session. The conversation log is a single
//! serialized JSON array rewritten wholesale on every append — a
//! read-modify-write that assumes single-writer access per session id
//! (the orchestrator serializes turns). Each store call holds the
//! connection lock for its full duration, so an individual append can
//! never interleave with another call on the same handle.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{lock, now, text_col};
use crate::error::Result;
use crate::types::{ConversationMessage, GuideSession, GuideStep};

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

const SESSION_COLS: &str = "id, work_id, current_step, conversation_log, created_at, updated_at";

fn map_session(row: &Row<'_>) -> rusqlite::Result<GuideSession> {
    let log_raw: String = row.get(3)?;
    let messages = serde_json::from_str(&log_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(GuideSession {
        id: row.get(0)?,
        work_id: row.get(1)?,
        current_step: text_col(2, row.get::<_, String>(2)?)?,
        messages,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl SessionStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        SessionStore { conn }
    }

    /// Insert a new session at `step1` with an empty log.
    ///
    /// Propagates the referential-integrity error if `work_id` does not
    /// reference an existing work.
    pub fn create(&self, work_id: i64) -> Result<GuideSession> {
        let conn = lock(&self.conn);
        let ts = now();
        conn.execute(
            "INSERT INTO guide_sessions (work_id, current_step, conversation_log, created_at, updated_at)
             VALUES (?1, 'step1', '[]', ?2, ?2)",
            params![work_id, ts],
        )?;
        let id = conn.last_insert_rowid();
        let session = conn.query_row(
            &format!("SELECT {SESSION_COLS} FROM guide_sessions WHERE id = ?1"),
            [id],
            map_session,
        )?;
        Ok(session)
    }

    pub fn get(&self, session_id: i64) -> Result<Option<GuideSession>> {
        let conn = lock(&self.conn);
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLS} FROM guide_sessions WHERE id = ?1"),
                [session_id],
                map_session,
            )
            .optional()?;
        Ok(session)
    }

    /// The current session for a work: greatest id wins. Id order, not
    /// timestamp, so clock-resolution ties cannot flip the answer.
    pub fn latest_by_work_id(&self, work_id: i64) -> Result<Option<GuideSession>> {
        let conn = lock(&self.conn);
        let session = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLS} FROM guide_sessions
                     WHERE work_id = ?1 ORDER BY id DESC LIMIT 1"
                ),
                [work_id],
                map_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Persist a step transition. `Ok(None)` if the session does not exist.
    pub fn update_step(&self, session_id: i64, step: GuideStep) -> Result<Option<GuideSession>> {
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE guide_sessions SET current_step = ?1, updated_at = ?2 WHERE id = ?3",
            params![step.as_str(), now(), session_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let session = conn.query_row(
            &format!("SELECT {SESSION_COLS} FROM guide_sessions WHERE id = ?1"),
            [session_id],
            map_session,
        )?;
        Ok(Some(session))
    }

    /// Append one message to the end of the serialized log, preserving all
    /// prior entries and their order. `Ok(None)` if the session does not
    /// exist.
    pub fn append_message(
        &self,
        session_id: i64,
        message: &ConversationMessage,
    ) -> Result<Option<GuideSession>> {
        let conn = lock(&self.conn);
        let log_raw: Option<String> = conn
            .query_row(
                "SELECT conversation_log FROM guide_sessions WHERE id = ?1",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(log_raw) = log_raw else {
            return Ok(None);
        };

        let mut messages: Vec<ConversationMessage> = serde_json::from_str(&log_raw)?;
        messages.push(message.clone());
        let updated = serde_json::to_string(&messages)?;

        conn.execute(
            "UPDATE guide_sessions SET conversation_log = ?1, updated_at = ?2 WHERE id = ?3",
            params![updated, now(), session_id],
        )?;
        let session = conn.query_row(
            &format!("SELECT {SESSION_COLS} FROM guide_sessions WHERE id = ?1"),
            [session_id],
            map_session,
        )?;
        Ok(Some(session))
    }

    /// The deserialized log in original order. `Ok(None)` means the session
    /// does not exist — distinct from `Ok(Some(vec![]))`, which means the
    /// session exists with no messages yet.
    pub fn conversation(&self, session_id: i64) -> Result<Option<Vec<ConversationMessage>>> {
        Ok(self.get(session_id)?.map(|s| s.messages))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::AtelierError;
    use crate::types::{Role, WorkType};

    fn db_with_work() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let work = db.works().create("w", WorkType::Skill, None).unwrap();
        (db, work.id)
    }

    fn msg(role: Role, content: &str) -> ConversationMessage {
        ConversationMessage::now(role, content)
    }

    #[test]
    fn create_starts_at_step1_with_empty_log() {
        let (db, work_id) = db_with_work();
        let session = db.sessions().create(work_id).unwrap();
        assert_eq!(session.current_step, GuideStep::Step1);
        assert!(session.messages.is_empty());
        assert_eq!(session.work_id, work_id);
    }

    #[test]
    fn create_for_missing_work_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.sessions().create(999);
        assert!(matches!(result, Err(AtelierError::Db(_))), "{result:?}");
    }

    #[test]
    fn latest_by_work_id_picks_greatest_id() {
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let first = sessions.create(work_id).unwrap();
        let second = sessions.create(work_id).unwrap();
        assert!(second.id > first.id);

        let latest = sessions.latest_by_work_id(work_id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn latest_by_work_id_none_when_no_sessions() {
        let (db, work_id) = db_with_work();
        assert!(db.sessions().latest_by_work_id(work_id).unwrap().is_none());
    }

    #[test]
    fn append_preserves_order_and_content() {
        // N appends come back in call order with no loss, including
        // messages with embedded newlines and special characters.
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let session = sessions.create(work_id).unwrap();

        let contents = [
            "plain",
            "multi\nline\ncontent",
            "quotes \" and \\ backslashes",
            "unicode — ✓ 日本語",
            "",
        ];
        for content in contents {
            sessions
                .append_message(session.id, &msg(Role::User, content))
                .unwrap()
                .unwrap();
        }

        let log = sessions.conversation(session.id).unwrap().unwrap();
        assert_eq!(log.len(), contents.len());
        for (stored, expected) in log.iter().zip(contents) {
            assert_eq!(stored.content, expected);
        }
    }

    #[test]
    fn append_to_missing_session_returns_none() {
        let (db, _) = db_with_work();
        let result = db
            .sessions()
            .append_message(404, &msg(Role::User, "hello"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn append_refreshes_updated_at() {
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let session = sessions.create(work_id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let after = sessions
            .append_message(session.id, &msg(Role::User, "x"))
            .unwrap()
            .unwrap();
        assert!(after.updated_at > session.updated_at);
    }

    #[test]
    fn update_step_roundtrips_all_valid_steps() {
        // Every valid step persists and reads back.
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let session = sessions.create(work_id).unwrap();

        for step in GuideStep::ALL {
            let updated = sessions.update_step(session.id, step).unwrap().unwrap();
            assert_eq!(updated.current_step, step);
            let latest = sessions.latest_by_work_id(work_id).unwrap().unwrap();
            assert_eq!(latest.current_step, step);
        }
    }

    #[test]
    fn update_step_missing_session_returns_none() {
        let (db, _) = db_with_work();
        let result = db.sessions().update_step(404, GuideStep::Step2).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn conversation_distinguishes_missing_from_empty() {
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let session = sessions.create(work_id).unwrap();

        assert_eq!(sessions.conversation(session.id).unwrap(), Some(vec![]));
        assert_eq!(sessions.conversation(404).unwrap(), None);
    }

    #[test]
    fn roles_survive_the_serialized_log() {
        let (db, work_id) = db_with_work();
        let sessions = db.sessions();
        let session = sessions.create(work_id).unwrap();
        sessions
            .append_message(session.id, &msg(Role::User, "q"))
            .unwrap();
        sessions
            .append_message(session.id, &msg(Role::Assistant, "a"))
            .unwrap();

        let log = sessions.conversation(session.id).unwrap().unwrap();
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[1].role, Role::Assistant);
    }
}
