use crate::error::AtelierError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorkType
// ---------------------------------------------------------------------------

/// What kind of artifact a work (or pattern) produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Skill,
    Agent,
    Orchestration,
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkType::Skill => "skill",
            WorkType::Agent => "agent",
            WorkType::Orchestration => "orchestration",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for WorkType {
    type Err = AtelierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "skill" => Ok(WorkType::Skill),
            "agent" => Ok(WorkType::Agent),
            "orchestration" => Ok(WorkType::Orchestration),
            other => Err(AtelierError::InvalidWorkType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Draft,
    InProgress,
    Exported,
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkStatus::Draft => "draft",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Exported => "exported",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = AtelierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(WorkStatus::Draft),
            "in_progress" => Ok(WorkStatus::InProgress),
            "exported" => Ok(WorkStatus::Exported),
            other => Err(AtelierError::InvalidWorkStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// GuideStep
// ---------------------------------------------------------------------------

/// The five ordered steps of a guided authoring session.
///
/// Persisted as `"step1"`..`"step5"`; any other value is a contract
/// violation and fails loudly at the parse boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideStep {
    #[default]
    Step1,
    Step2,
    Step3,
    Step4,
    Step5,
}

impl GuideStep {
    pub const ALL: [GuideStep; 5] = [
        GuideStep::Step1,
        GuideStep::Step2,
        GuideStep::Step3,
        GuideStep::Step4,
        GuideStep::Step5,
    ];

    /// 1-based step number.
    pub fn number(self) -> u8 {
        match self {
            GuideStep::Step1 => 1,
            GuideStep::Step2 => 2,
            GuideStep::Step3 => 3,
            GuideStep::Step4 => 4,
            GuideStep::Step5 => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(GuideStep::Step1),
            2 => Some(GuideStep::Step2),
            3 => Some(GuideStep::Step3),
            4 => Some(GuideStep::Step4),
            5 => Some(GuideStep::Step5),
            _ => None,
        }
    }

    /// The following step, or `None` at step 5.
    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    /// The preceding step, or `None` at step 1.
    pub fn prev(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GuideStep::Step1 => "step1",
            GuideStep::Step2 => "step2",
            GuideStep::Step3 => "step3",
            GuideStep::Step4 => "step4",
            GuideStep::Step5 => "step5",
        }
    }
}

impl fmt::Display for GuideStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GuideStep {
    type Err = AtelierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "step1" => Ok(GuideStep::Step1),
            "step2" => Ok(GuideStep::Step2),
            "step3" => Ok(GuideStep::Step3),
            "step4" => Ok(GuideStep::Step4),
            "step5" => Ok(GuideStep::Step5),
            other => Err(AtelierError::InvalidStep(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Rendered by the UI but never written to the persisted log.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = AtelierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(AtelierError::InvalidRole(other.to_string())),
        }
    }
}

/// One turn half in a guide conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// RFC 3339, assigned at the moment of creation client-side.
    pub timestamp: String,
}

impl ConversationMessage {
    /// A message timestamped now.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        ConversationMessage {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Work {
    pub id: i64,
    pub name: String,
    pub work_type: WorkType,
    pub status: WorkStatus,
    pub base_pattern_id: Option<i64>,
    pub export_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pattern {
    pub id: i64,
    pub name: String,
    pub pattern_type: WorkType,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A file staged for export. Export prefers `edited_content` when present.
#[derive(Debug, Clone, Serialize)]
pub struct WorkFile {
    pub id: i64,
    pub work_id: i64,
    pub file_path: String,
    pub original_content: String,
    pub edited_content: Option<String>,
}

/// One authoring session per work; the most recently created (greatest id)
/// is the current one.
#[derive(Debug, Clone, Serialize)]
pub struct GuideSession {
    pub id: i64,
    pub work_id: i64,
    pub current_step: GuideStep,
    pub messages: Vec<ConversationMessage>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ordering_and_boundaries() {
        assert_eq!(GuideStep::Step1.next(), Some(GuideStep::Step2));
        assert_eq!(GuideStep::Step5.next(), None);
        assert_eq!(GuideStep::Step1.prev(), None);
        assert_eq!(GuideStep::Step3.prev(), Some(GuideStep::Step2));
        assert_eq!(GuideStep::from_number(0), None);
        assert_eq!(GuideStep::from_number(6), None);
    }

    #[test]
    fn step_roundtrips_through_string() {
        for step in GuideStep::ALL {
            let parsed: GuideStep = step.as_str().parse().unwrap();
            assert_eq!(parsed, step);
        }
    }

    #[test]
    fn invalid_step_fails_loudly() {
        for bad in ["step0", "step6", "Step1", "1", ""] {
            let result: std::result::Result<GuideStep, _> = bad.parse();
            assert!(
                matches!(result, Err(AtelierError::InvalidStep(_))),
                "expected invalid: {bad}"
            );
        }
    }

    #[test]
    fn work_type_roundtrip() {
        for t in [WorkType::Skill, WorkType::Agent, WorkType::Orchestration] {
            let parsed: WorkType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("widget".parse::<WorkType>().is_err());
    }

    #[test]
    fn message_json_roundtrip_preserves_special_characters() {
        let msg = ConversationMessage::now(Role::User, "line one\nline two\t\"quoted\"");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ConversationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn message_timestamp_is_rfc3339() {
        let msg = ConversationMessage::now(Role::Assistant, "hi");
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
    }
}
