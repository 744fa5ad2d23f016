//! Tool registry & capability contract (§4.1).
//!
//! Grounded on `orca::tools::direct_bridge::DirectToolBridge` (an
//! `Arc<HashMap<String, Arc<dyn ToolExecutor>>>` registry checked against a
//! permission enforcer before each call, logging both the decision and the
//! result) and `orca::tools::permission_enforcer::ExecutionDecision`. The engine
//! folds approval gating into Session state (§3) rather than a DB-backed
//! permission table, since spec §4.8 routes approval decisions through
//! `state.trust_mode`/`state.approval_cache`, not a separate repository.

pub mod builtin;
pub mod registry;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde_json::Value;

use crate::state::RiskLevel;

/// The outcome of one `execute` call (§4.1, §6): `success` is mandatory, the
/// rest is advisory context a thought-context builder or replanner may read.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hints: Vec<String>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

impl ToolResult {
    pub fn ok(data: serde_json::Map<String, Value>) -> Self {
        Self {
            success: true,
            error: None,
            error_type: None,
            hints: Vec::new(),
            data,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_type: None,
            hints: Vec::new(),
            data: serde_json::Map::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({"success": self.success, "error": self.error})
        })
    }
}

/// Per-tool capability contract (§4.1, §6). `execute` never throws: a tool that
/// would otherwise panic or return an `Err` from its inner logic must convert
/// that into `ToolResult::failure` — the one exception is a true Rust panic,
/// which the scheduler catches at the call site and wraps itself (§4.8:
/// "wrap any thrown exception as a failed Result").
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn requires_approval(&self) -> bool;
    fn approval_risk_level(&self) -> RiskLevel;
    async fn execute(&self, args: Value) -> ToolResult;

    /// Optional human-readable preview of what will happen if a pending
    /// approval is confirmed (§4.1).
    fn approval_preview(&self, _args: &Value) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_ok_has_no_error() {
        let result = ToolResult::ok(serde_json::Map::new());
        assert!(result.success);
        assert!(result.error.is_none());
    }

    #[test]
    fn tool_result_failure_carries_message() {
        let result = ToolResult::failure("ENOENT");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("ENOENT"));
    }
}
