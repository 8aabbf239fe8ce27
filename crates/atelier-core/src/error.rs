use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtelierError {
    #[error("work not found: {0}")]
    WorkNotFound(i64),

    #[error("pattern not found: {0}")]
    PatternNotFound(i64),

    #[error("invalid work type: {0}")]
    InvalidWorkType(String),

    #[error("invalid work status: {0}")]
    InvalidWorkStatus(String),

    #[error("invalid guide step: {0}")]
    InvalidStep(String),

    #[error("invalid message role: {0}")]
    InvalidRole(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error("export failed for '{path}': {reason}")]
    Export { path: String, reason: String },

    #[error("discovery tool exited with code {code}: {stderr}")]
    Discovery { code: i32, stderr: String },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Runner(#[from] claude_runner::RunnerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AtelierError>;
