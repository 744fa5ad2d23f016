//! Deterministic fake capability for tests (Design Note §9: "tests substitute
//! a deterministic fake capability" rather than a real provider).

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::error::{LlmError, Result};
use crate::llm::{ChatClient, ChatRequest, ChatResponse};

/// Replays a fixed, ordered script of responses, one per call; optionally
/// fails the next N calls before returning a response, to exercise retry
/// paths (§8 scenario 3: "Retry then succeed").
pub struct FakeLlmClient {
    script: Mutex<Vec<ScriptedTurn>>,
    calls: Mutex<Vec<ChatRequest>>,
}

enum ScriptedTurn {
    Respond(Value),
    Fail(LlmError),
}

impl FakeLlmClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful JSON response to be returned on the next `chat` call.
    pub fn push_json(&self, value: Value) -> &Self {
        self.script.lock().unwrap().push(ScriptedTurn::Respond(value));
        self
    }

    /// Queue a failure to be returned on the next `chat` call.
    pub fn push_failure(&self, error: LlmError) -> &Self {
        self.script.lock().unwrap().push(ScriptedTurn::Fail(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for FakeLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for FakeLlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.calls.lock().unwrap().push(request);
        let turn = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };
        match turn {
            Some(ScriptedTurn::Respond(value)) => Ok(ChatResponse::json(value)),
            Some(ScriptedTurn::Fail(error)) => Err(error),
            None => Err(LlmError::Other("fake llm client script exhausted".into())),
        }
    }
}
