//! Tool registry: name -> `Arc<dyn Tool>`, safe for concurrent use across
//! sessions (Design Note §9: "process-wide collaborators... not singletons in
//! the language sense"). Grounded on
//! `orca::tools::direct_bridge::DirectToolBridge`'s
//! `tools: Arc<HashMap<String, Arc<dyn ToolExecutor>>>` field.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::tools::{Tool, ToolResult};

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Render the tools catalog the Planner/Replanner/Scheduler embed in their
    /// prompts (§4.6, §4.7, §4.8: "the tools catalog").
    pub fn describe_all(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters_schema": tool.parameters_schema(),
                    "requires_approval": tool.requires_approval(),
                    "approval_risk_level": format!("{:?}", tool.approval_risk_level()).to_uppercase(),
                })
            })
            .collect()
    }

    /// Look up and invoke a tool, converting "tool not found" into a Result the
    /// caller's step can record (§4.8: unknown tool is a structural error, §7
    /// kind 3) rather than an engine-level `Err`.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))?;
        Ok(tool.execute(args).await)
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: Arc::new(self.tools),
        }
    }
}
