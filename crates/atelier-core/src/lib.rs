pub mod db;
pub mod discovery;
pub mod error;
pub mod export;
pub mod guide;
pub mod pattern;
pub mod prompts;
pub mod session;
pub mod types;
pub mod work;

pub use db::Database;
pub use error::{AtelierError, Result};
pub use guide::{GuideOrchestrator, GuideState, StepRunner};
pub use pattern::PatternStore;
pub use session::SessionStore;
pub use types::{
    ConversationMessage, GuideSession, GuideStep, Pattern, Role, Work, WorkFile, WorkStatus,
    WorkType,
};
pub use work::WorkStore;
