//! Reference tools used to exercise the engine end to end (scenarios in §8).
//! Concrete tool implementations are out of scope per spec §1 — these two exist
//! purely so the scheduler and approval gate have something real to call.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::state::RiskLevel;
use crate::tools::{Tool, ToolResult};

/// Writes `content` to an in-memory "filesystem" keyed by `path`. Low risk, no
/// approval required — grounds the happy-path scenario (§8 scenario 1).
pub struct FileWriteTool {
    written: Mutex<Vec<(String, String)>>,
}

impl FileWriteTool {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
        }
    }

    pub async fn written_files(&self) -> Vec<(String, String)> {
        self.written.lock().await.clone()
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write textual content to a file path."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["path", "content"],
        })
    }

    fn requires_approval(&self) -> bool {
        false
    }

    fn approval_risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolResult::failure("missing required argument: path"),
        };
        let content = match args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolResult::failure("missing required argument: content"),
        };

        self.written.lock().await.push((path.clone(), content.clone()));

        let mut data = serde_json::Map::new();
        data.insert("path".into(), Value::String(path.clone()));
        data.insert(
            "content".into(),
            Value::String(format!("wrote {} bytes to {}", content.len(), path)),
        );
        ToolResult::ok(data)
    }

    fn approval_preview(&self, args: &Value) -> Option<String> {
        args.get("path")
            .and_then(|v| v.as_str())
            .map(|p| format!("write to {p}"))
    }
}

/// Simulates running a shell command. High risk, requires approval — grounds
/// the approval-denied scenario (§8 scenario 5).
pub struct ShellTool;

impl ShellTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command (simulated)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"command": {"type": "string"}},
            "required": ["command"],
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn approval_risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let command = match args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolResult::failure("missing required argument: command"),
        };
        let mut data = serde_json::Map::new();
        data.insert("command".into(), Value::String(command.clone()));
        data.insert("result".into(), Value::String(format!("ran: {command}")));
        ToolResult::ok(data)
    }

    fn approval_preview(&self, args: &Value) -> Option<String> {
        args.get("command")
            .and_then(|v| v.as_str())
            .map(|c| format!("run shell command: {c}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_write_records_and_returns_success() {
        let tool = FileWriteTool::new();
        let result = tool
            .execute(serde_json::json!({"path": "hello.txt", "content": "hi"}))
            .await;
        assert!(result.success);
        assert_eq!(tool.written_files().await, vec![("hello.txt".into(), "hi".into())]);
    }

    #[tokio::test]
    async fn file_write_missing_args_fails() {
        let tool = FileWriteTool::new();
        let result = tool.execute(serde_json::json!({"path": "hello.txt"})).await;
        assert!(!result.success);
    }

    #[test]
    fn shell_requires_approval_at_high_risk() {
        let tool = ShellTool::new();
        assert!(tool.requires_approval());
        assert_eq!(tool.approval_risk_level(), RiskLevel::High);
    }
}
