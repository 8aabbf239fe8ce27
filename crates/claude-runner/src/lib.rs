//! `claude-runner` — streaming driver for the `claude` CLI subprocess.
//!
//! Runs one `claude -p <message> [--system <prompt>] --output-format
//! stream-json` invocation per request, forwarding stdout and stderr
//! lines to a registered sink as they arrive and resolving with the
//! accumulated stdout once the process exits cleanly.
//!
//! # Architecture
//!
//! ```text
//! ClaudeRunner::run(input, system_prompt)
//!     │  spawns `claude -p … --output-format stream-json`
//!     ▼
//! stdout lines ──► sink (StreamEvent::Stdout) + accumulator
//! stderr lines ──► sink (StreamEvent::Stderr), non-fatal
//!     │
//!     ▼
//! exit 0  → Ok(full accumulated stdout)
//! exit ≠0 → Err(RunnerError::Exit { code, stderr })
//! ```
//!
//! Each run owns its own child process; the runner only tracks an abort
//! route to the most recent run. A caller that wants to cancel calls
//! [`ClaudeRunner::abort`], which signals that run to kill its process
//! and clears the route; the run then resolves with
//! [`RunnerError::Aborted`] through the normal close path. A run
//! overtaken by a newer one keeps running and resolves from its own
//! exit status.

pub mod error;
pub mod runner;

pub use error::RunnerError;
pub use runner::{ClaudeRunner, StreamEvent};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
