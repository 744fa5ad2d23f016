//! Bounded rolling conversation history (spec §3 supplement).
//!
//! Grounded on `original_source/capstone/agent_v2/agent.py`'s `MessageHistory`:
//! the system prompt is pinned first and never evicted, and callers read back
//! only the last N user/assistant pairs rather than the full transcript.

use crate::llm::Message;

const DEFAULT_MAX_PAIRS: usize = 20;

/// A conversation log that keeps a pinned system message plus a bounded tail
/// of the most recent exchanges, so long-running sessions don't grow the
/// thought-context prompt without bound.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    system: Option<Message>,
    turns: Vec<Message>,
    max_pairs: usize,
}

impl ConversationLog {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system: Some(Message::system(system_prompt)),
            turns: Vec::new(),
            max_pairs: DEFAULT_MAX_PAIRS,
        }
    }

    pub fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Message::user(content));
        self.trim();
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Message::assistant(content));
        self.trim();
    }

    fn trim(&mut self) {
        let max_messages = self.max_pairs * 2;
        if self.turns.len() > max_messages {
            let excess = self.turns.len() - max_messages;
            self.turns.drain(0..excess);
        }
    }

    /// The system prompt (if any) followed by the last N user/assistant pairs,
    /// matching `MessageHistory.get_last_n_messages`.
    pub fn as_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.turns.len() + 1);
        if let Some(system) = &self.system {
            out.push(system.clone());
        }
        out.extend(self.turns.iter().cloned());
        out
    }
}
