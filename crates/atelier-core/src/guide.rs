//! The guided authoring state machine.
//!
//! [`GuideOrchestrator`] is the only component that ties persistence, the
//! external claude process, and UI-observable state together. It owns an
//! in-memory mirror of one work's session and processes one logical
//! operation at a time; the UI is expected to disable input while
//! `is_streaming` is set.
//!
//! ```text
//! Uninitialized ──init_guide──► Loading ──ok──► Ready
//!                                  │
//!                                  └──err──► Error (terminal view)
//!
//! Ready ──send_message──► Streaming ──► Ready   (turn failure stays Ready,
//! Ready ──go_to_step────► Ready                  error shown inline)
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use claude_runner::ClaudeRunner;
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{AtelierError, Result};
use crate::pattern::PatternStore;
use crate::prompts;
use crate::session::SessionStore;
use crate::types::{ConversationMessage, GuideSession, GuideStep, Pattern, Role, Work};
use crate::work::WorkStore;

// ---------------------------------------------------------------------------
// StepRunner seam
// ---------------------------------------------------------------------------

/// The orchestrator's view of the external process runner.
///
/// Injected through the constructor so tests can script responses without
/// spawning a real subprocess.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, input: &str, system_prompt: Option<&str>) -> claude_runner::Result<String>;
    fn abort(&self);
    fn check_availability(&self) -> bool;
}

#[async_trait]
impl StepRunner for ClaudeRunner {
    async fn run(&self, input: &str, system_prompt: Option<&str>) -> claude_runner::Result<String> {
        ClaudeRunner::run(self, input, system_prompt).await
    }

    fn abort(&self) {
        ClaudeRunner::abort(self)
    }

    fn check_availability(&self) -> bool {
        ClaudeRunner::check_availability(self)
    }
}

// ---------------------------------------------------------------------------
// GuideState
// ---------------------------------------------------------------------------

/// The externally observable state tuple. The UI re-renders from this after
/// every orchestrator operation.
#[derive(Default)]
pub struct GuideState {
    pub work: Option<Work>,
    pub session: Option<GuideSession>,
    pub base_pattern: Option<Pattern>,
    pub messages: Vec<ConversationMessage>,
    pub current_step: GuideStep,
    pub is_streaming: bool,
    pub runner_available: bool,
    /// Latest assistant response per step — overwritten each turn, never a
    /// history. Rebuilt empty on every init; not reconstructed from the
    /// persisted log.
    pub design_state: HashMap<GuideStep, String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl GuideState {
    /// Work and session loaded, not mid-initialization.
    pub fn is_ready(&self) -> bool {
        self.work.is_some() && self.session.is_some() && !self.loading
    }

    /// Gate for offering "next step": any assistant message anywhere in the
    /// loaded conversation, not specifically one from the current step.
    pub fn can_advance(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::Assistant)
    }
}

// ---------------------------------------------------------------------------
// GuideOrchestrator
// ---------------------------------------------------------------------------

pub struct GuideOrchestrator<R: StepRunner> {
    works: WorkStore,
    patterns: PatternStore,
    sessions: SessionStore,
    runner: R,
    state: GuideState,
}

impl<R: StepRunner> GuideOrchestrator<R> {
    pub fn new(db: &Database, runner: R) -> Self {
        GuideOrchestrator {
            works: db.works(),
            patterns: db.patterns(),
            sessions: db.sessions(),
            runner,
            state: GuideState::default(),
        }
    }

    pub fn state(&self) -> &GuideState {
        &self.state
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Load (or lazily create) the guide session for a work.
    ///
    /// On any failure the state collapses to the error view — no partial
    /// Ready state is ever observable.
    pub async fn init_guide(&mut self, work_id: i64) {
        self.state = GuideState {
            loading: true,
            ..GuideState::default()
        };
        if let Err(e) = self.try_init(work_id).await {
            warn!("guide init failed for work {work_id}: {e}");
            self.state = GuideState {
                error: Some(e.to_string()),
                ..GuideState::default()
            };
            return;
        }
        self.state.loading = false;
    }

    async fn try_init(&mut self, work_id: i64) -> Result<()> {
        let work = self
            .works
            .get(work_id)?
            .ok_or(AtelierError::WorkNotFound(work_id))?;
        self.state.runner_available = self.runner.check_availability();

        let session = match self.sessions.latest_by_work_id(work_id)? {
            Some(s) => s,
            None => self.sessions.create(work_id)?,
        };
        let messages = self.sessions.conversation(session.id)?.unwrap_or_default();
        let base_pattern = match work.base_pattern_id {
            Some(pid) => self.patterns.get(pid)?,
            None => None,
        };

        debug!(
            work_id,
            session_id = session.id,
            step = %session.current_step,
            "guide session loaded"
        );
        self.state.current_step = session.current_step;
        self.state.messages = messages;
        self.state.base_pattern = base_pattern;
        self.state.session = Some(session);
        self.state.work = Some(work);
        Ok(())
    }

    /// Run one turn: optimistic local append, persist, stream the runner,
    /// persist and fold the response.
    ///
    /// Preconditions not met (no session/work loaded) is a silent no-op —
    /// the UI disables input until Ready, so this is a caller-contract
    /// violation rather than an error. Turn failures land in `state.error`
    /// and never roll back the optimistic user message.
    pub async fn send_message(&mut self, content: &str) {
        let (Some(session_id), Some(work_type)) = (
            self.state.session.as_ref().map(|s| s.id),
            self.state.work.as_ref().map(|w| w.work_type),
        ) else {
            return;
        };

        // The design-state key is the step current when the turn STARTED,
        // not the step at completion.
        let step_at_start = self.state.current_step;
        self.state.error = None;

        let user = ConversationMessage::now(Role::User, content);
        self.state.messages.push(user.clone());

        if let Err(e) = self.persist_message(session_id, &user) {
            self.state.error = Some(e.to_string());
            return;
        }

        self.state.is_streaming = true;
        let system_prompt =
            prompts::system_prompt(step_at_start, work_type, self.state.base_pattern.as_ref());

        match self.runner.run(content, Some(&system_prompt)).await {
            Ok(response) => {
                let assistant = ConversationMessage::now(Role::Assistant, response.clone());
                if let Err(e) = self.persist_message(session_id, &assistant) {
                    self.state.is_streaming = false;
                    self.state.error = Some(e.to_string());
                    return;
                }
                self.state.messages.push(assistant);
                self.state.is_streaming = false;
                self.state.design_state.insert(step_at_start, response);
            }
            Err(e) => {
                self.state.is_streaming = false;
                self.state.error = Some(e.to_string());
            }
        }
    }

    fn persist_message(&self, session_id: i64, message: &ConversationMessage) -> Result<()> {
        if self.sessions.append_message(session_id, message)?.is_none() {
            warn!("session {session_id} disappeared mid-turn; message not persisted");
        }
        Ok(())
    }

    /// Persist a step transition, then mirror it locally.
    ///
    /// Store errors propagate to the caller; there is no local error-state
    /// capture for step transitions.
    pub async fn go_to_step(&mut self, step: GuideStep) -> Result<()> {
        let Some(session_id) = self.state.session.as_ref().map(|s| s.id) else {
            return Ok(());
        };
        if let Some(session) = self.sessions.update_step(session_id, step)? {
            self.state.current_step = step;
            self.state.session = Some(session);
        }
        Ok(())
    }

    /// Advance one step; no-op at step 5.
    pub async fn next_step(&mut self) -> Result<()> {
        match self.state.current_step.next() {
            Some(step) => self.go_to_step(step).await,
            None => Ok(()),
        }
    }

    /// Go back one step; no-op at step 1.
    pub async fn prev_step(&mut self) -> Result<()> {
        match self.state.current_step.prev() {
            Some(step) => self.go_to_step(step).await,
            None => Ok(()),
        }
    }

    /// Clear everything back to the uninitialized tuple. Used when
    /// navigating from one work's guide to another's, so a new `init_guide`
    /// never sees stale state.
    pub fn reset(&mut self) {
        self.state = GuideState::default();
    }

    /// Current session, if initialized.
    pub fn session(&self) -> Option<&GuideSession> {
        self.state.session.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
