//! Engine error type
//!
//! Hand-rolled, non-`thiserror` error enum in the same shape as `orca::error::OrcaError`:
//! a manual `Display` and a manual `Error::source`, with `From` conversions at the
//! boundaries the engine actually crosses (io, json, sqlx).

use std::fmt;

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The four error kinds from the error handling design (§7), plus the structural
/// sub-cases the plan mutator and scheduler need to report precisely.
#[derive(Debug)]
pub enum EngineError {
    /// Config file missing or malformed.
    Config(String),

    /// Underlying database failure.
    Database(String),

    /// A tool's `execute` threw rather than returning a failed Result.
    ToolExecution(String),

    /// Requested tool is not in the registry.
    UnknownTool(String),

    /// A plan, step, or session id does not exist in its store.
    NotFound(String),

    /// A PlanMutator precondition failed: replan cap, missing step, cycle,
    /// self-reference, or empty subtask list.
    InvalidMutation(String),

    /// Plan/Thought/Replan JSON failed to parse or did not match the expected schema.
    InvalidJson(String),

    /// The LLM capability exhausted its retry policy.
    LlmError(String),

    /// The scheduler hit `MAX_ITERATIONS` before the plan completed.
    MaxIterationsExceeded,

    /// State or plan persistence failed in a way that cannot be retried.
    Fatal(String),

    /// Catch-all for conditions that don't fit the above.
    Other(String),

    Io(std::io::Error),
    Serde(serde_json::Error),
    Sqlx(sqlx::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Database(msg) => write!(f, "database error: {msg}"),
            Self::ToolExecution(msg) => write!(f, "tool execution error: {msg}"),
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidMutation(msg) => write!(f, "invalid mutation: {msg}"),
            Self::InvalidJson(msg) => write!(f, "invalid json: {msg}"),
            Self::LlmError(msg) => write!(f, "llm capability error: {msg}"),
            Self::MaxIterationsExceeded => write!(f, "maximum iterations exceeded"),
            Self::Fatal(msg) => write!(f, "fatal error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Serde(e) => write!(f, "serialization error: {e}"),
            Self::Sqlx(e) => write!(f, "sqlx error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serde(e) => Some(e),
            Self::Sqlx(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e)
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sqlx(e)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}

impl From<crate::llm::LlmError> for EngineError {
    fn from(e: crate::llm::LlmError) -> Self {
        Self::LlmError(e.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
