//! LLM capability boundary (§4.5): the one seam through which the Planner,
//! Replanner, and Scheduler reach a model. Grounded on `llm::lib`'s
//! `ChatModel`/`ChatRequest`/`ChatResponse` re-exports from `langgraph_core`,
//! reshaped into a capability the engine owns directly rather than one more
//! layer over an external graph-execution framework.

pub mod error;
pub mod fake;
pub mod retry;

pub use error::LlmError;
pub use fake::FakeLlmClient;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat message role, mirroring the teacher's `Message::human`/`system`/`ai`
/// constructors but kept as plain data rather than a builder-heavy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The three model aliases the Planner/Replanner/Scheduler pick between (§4.5,
/// §4.6, §4.7, §4.8): `fast` for cheap planning passes, `main` for
/// replanning and the ReAct loop's own thought step, `powerful` reserved for
/// callers that explicitly ask for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAlias {
    Fast,
    Main,
    Powerful,
}

impl ModelAlias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Main => "main",
            Self::Powerful => "powerful",
        }
    }
}

/// Reasoning effort a provider may expose, derived from `temperature` (§4.5):
/// `t < 0.3 -> low`, `0.3 <= t <= 0.7 -> medium`, `t > 0.7 -> high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

pub fn effort_for_temperature(temperature: f64) -> Effort {
    if temperature < 0.3 {
        Effort::Low
    } else if temperature <= 0.7 {
        Effort::Medium
    } else {
        Effort::High
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model_alias: ModelAlias,
    /// When `Some("json_object")`, the provider is asked to return strict JSON
    /// (§4.6, §4.7: `response_format=json_object`).
    pub response_format: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, model_alias: ModelAlias) -> Self {
        Self {
            messages,
            model_alias,
            response_format: None,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn effort(&self) -> Effort {
        effort_for_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    /// Parsed JSON body when `response_format` was honored; callers that asked
    /// for `json_object` should prefer this over re-parsing `content`.
    pub parsed: Option<Value>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            parsed: None,
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            content: value.to_string(),
            parsed: Some(value),
        }
    }
}

/// The LLM capability contract (§4.5): a single `complete`-style call, free of
/// any particular provider's SDK types.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> error::Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effort_boundaries_match_spec() {
        assert_eq!(effort_for_temperature(0.0), Effort::Low);
        assert_eq!(effort_for_temperature(0.29), Effort::Low);
        assert_eq!(effort_for_temperature(0.3), Effort::Medium);
        assert_eq!(effort_for_temperature(0.7), Effort::Medium);
        assert_eq!(effort_for_temperature(0.71), Effort::High);
        assert_eq!(effort_for_temperature(1.0), Effort::High);
    }
}
