use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("claude process exited with code {code}; stderr: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("claude process terminated by signal; stderr: {stderr}")]
    Signal { stderr: String },

    #[error("claude process aborted")]
    Aborted,

    #[error("claude process timed out after {0:?}")]
    Timeout(std::time::Duration),
}
