//! LLM capability error type.
//!
//! Grounded on `llm::error::LlmError`: a `thiserror`-derived enum with an
//! `is_retryable()` predicate the retry policy consults to decide whether an
//! attempt is worth repeating. Unlike the teacher this crate ships no real HTTP
//! provider, so there is no `#[from] reqwest::Error` variant — only the
//! transport-agnostic failure classes a capability boundary actually needs (§4.5,
//! §7 error kind 4: "LLM capability error").

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Only transient-error classes are worth retrying (§4.5: "retry is scoped
    /// to the transient-error classes, never to a malformed-request error").
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ServiceUnavailable(_) | LlmError::Timeout(_) | LlmError::RateLimitExceeded(_)
        )
    }
}
