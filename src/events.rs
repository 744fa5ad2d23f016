//! Event stream (§4.9) — the ordered sequence of typed events a single `execute`
//! call emits for observers.
//!
//! Grounded on `orca::events::ExecutionEvent`: a `#[serde(tag = "type")]` enum plus
//! an `EventLogger` that mirrors every emission into `tracing`. The variant set here
//! is the spec-mandated one instead of the teacher's task/workflow lifecycle set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event in the stream, `{type, data, session_id, timestamp}` per spec §3/§6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub session_id: String,
    pub timestamp: i64,
}

/// The seven event types spec §3 enumerates. Observers must treat unknown types
/// as ignorable (§4.9) — `#[serde(other)]` realizes that for deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thought,
    ToolStarted,
    ToolResult,
    StateUpdated,
    AskUser,
    Complete,
    Error,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thought => "thought",
            Self::ToolStarted => "tool_started",
            Self::ToolResult => "tool_result",
            Self::StateUpdated => "state_updated",
            Self::AskUser => "ask_user",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl Event {
    pub fn new(kind: EventKind, session_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            data,
            session_id: session_id.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Sink that both collects events for the caller's stream and mirrors each one
/// into `tracing`, matching `orca::events::EventLogger`'s `log()` behavior.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, emitting a structured `tracing` line alongside it. `ERROR`
    /// events log at `warn`, everything else at `info`.
    pub fn push(&mut self, kind: EventKind, session_id: &str, data: Value) {
        let event = Event::new(kind, session_id.to_string(), data.clone());
        match kind {
            EventKind::Error => {
                tracing::warn!(event_type = event.kind.as_str(), session_id = %session_id, data = %data, "execution event");
            }
            _ => {
                tracing::info!(event_type = event.kind.as_str(), session_id = %session_id, data = %data, "execution event");
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// True once a `COMPLETE` event (or a pause-triggering `ASK_USER`) has been
    /// emitted — no event may follow either, per §4.9.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.events.last().map(|e| e.kind),
            Some(EventKind::Complete) | Some(EventKind::AskUser)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::new(EventKind::Thought, "s1", json!({"rationale": "because"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "thought");
        assert_eq!(value["session_id"], "s1");
    }

    #[test]
    fn unknown_event_types_deserialize_as_unknown() {
        let value = json!({"type": "some_future_event", "data": {}, "session_id": "s1", "timestamp": 0});
        let event: Event = serde_json::from_value(value).unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn event_log_preserves_causal_order() {
        let mut log = EventLog::new();
        log.push(EventKind::Thought, "s1", json!({}));
        log.push(EventKind::ToolStarted, "s1", json!({}));
        log.push(EventKind::ToolResult, "s1", json!({"success": true}));
        let kinds: Vec<_> = log.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Thought, EventKind::ToolStarted, EventKind::ToolResult]
        );
    }

    #[test]
    fn complete_marks_the_log_terminal() {
        let mut log = EventLog::new();
        log.push(EventKind::Thought, "s1", json!({}));
        assert!(!log.is_terminal());
        log.push(EventKind::Complete, "s1", json!({}));
        assert!(log.is_terminal());
    }
}
