//! Engine configuration (§6 ambient concern).
//!
//! Grounded on `orca::config` (`schema.rs` + `loader.rs`): the same
//! sub-struct-per-concern shape, the same `${VAR}` environment-variable
//! expansion for secret-shaped fields, and the same "defaults, then merge
//! a file on top" loading idiom. Collapsed from the teacher's dual
//! user-level/project-level merge to a single `engine.toml` in the current
//! directory, since this engine has no notion of a project vs. user scope.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EngineError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Sqlite database file path.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "engine.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider: "openai", "anthropic", "gemini", etc.
    pub provider: String,
    /// Model name behind the "main" alias; "fast"/"powerful" are derived
    /// from it unless overridden.
    pub model: String,
    /// API key, supports `${VAR_NAME}` environment-variable expansion.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_base: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-sonnet".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_base: None,
        }
    }
}

/// Execution configuration (§3/§5: iteration guard, retry policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Workspace root directory (defaults to current directory).
    pub workspace_root: Option<PathBuf>,

    /// Maximum scheduler iterations before `MaxIterationsExceeded` (§3).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Default per-step retry budget, used when a step doesn't specify one.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Initial retry delay in milliseconds (llm::RetryPolicy).
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Retry backoff multiplier.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Per-attempt LLM call timeout in seconds.
    #[serde(default = "default_per_attempt_timeout_secs")]
    pub per_attempt_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    crate::scheduler::MAX_ITERATIONS
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_per_attempt_timeout_secs() -> u64 {
    60
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            max_iterations: default_max_iterations(),
            default_max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            per_attempt_timeout_secs: default_per_attempt_timeout_secs(),
        }
    }
}

impl ExecutionConfig {
    pub fn retry_policy(&self) -> crate::llm::RetryPolicy {
        crate::llm::RetryPolicy {
            max_attempts: self.default_max_attempts,
            initial_delay: std::time::Duration::from_millis(self.initial_retry_delay_ms),
            max_delay: std::time::Duration::from_millis(self.max_retry_delay_ms),
            backoff_multiplier: self.retry_multiplier,
            per_attempt_timeout: std::time::Duration::from_secs(self.per_attempt_timeout_secs),
        }
    }
}

/// Logging configuration, consumed by `tracing_subscriber` at binary startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// "compact", "pretty", "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl EngineConfig {
    /// Resolve `${VAR_NAME}`-shaped fields against the process environment
    /// (§6: "Provider credentials are read from the environment").
    pub fn resolve_env_vars(&mut self) {
        if let Some(ref api_key) = self.llm.api_key {
            self.llm.api_key = Some(Self::expand_env_var(api_key));
        }
        if let Some(ref api_base) = self.llm.api_base {
            self.llm.api_base = Some(Self::expand_env_var(api_base));
        }
    }

    fn expand_env_var(value: &str) -> String {
        if let Some(var_name) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Load configuration: defaults, then `./engine.toml` merged on top if
    /// present, then environment-variable expansion.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    pub async fn load_from(path: &PathBuf) -> Result<Self> {
        let mut config = Self::default();
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
            config = toml::from_str(&content)
                .map_err(|e| EngineError::Config(format!("failed to parse {}: {e}", path.display())))?;
        }
        config.resolve_env_vars();
        Ok(config)
    }

    fn default_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("engine.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_returns_defaults_when_file_missing() {
        let config = EngineConfig::load_from(&PathBuf::from("/nonexistent/engine.toml"))
            .await
            .unwrap();
        assert_eq!(config.database.path, "engine.db");
        assert_eq!(config.execution.max_iterations, crate::scheduler::MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn load_parses_file_and_expands_env_vars() {
        std::env::set_var("ENGINE_TEST_API_KEY", "secret-123");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        tokio::fs::write(
            &path,
            r#"
            [llm]
            provider = "openai"
            model = "gpt-4"
            api_key = "${ENGINE_TEST_API_KEY}"
            temperature = 0.0
            max_tokens = 2048
            "#,
        )
        .await
        .unwrap();

        let config = EngineConfig::load_from(&path).await.unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret-123"));

        std::env::remove_var("ENGINE_TEST_API_KEY");
    }

    #[test]
    fn unset_env_var_left_as_placeholder() {
        let mut config = EngineConfig {
            llm: LlmConfig {
                api_key: Some("${DOES_NOT_EXIST_ENV_VAR}".to_string()),
                ..LlmConfig::default()
            },
            ..EngineConfig::default()
        };
        config.resolve_env_vars();
        assert_eq!(config.llm.api_key.as_deref(), Some("${DOES_NOT_EXIST_ENV_VAR}"));
    }
}
