//! Flattens an [`McpManager`]'s per-server tool catalog into the
//! provider-agnostic [`ToolDefinition`] list the LLM sees, and resolves a
//! tool-call by name back to the server that owns it.

use std::collections::HashMap;

use orc_domain::error::{Error, Result};
use orc_domain::tool::ToolDefinition;
use orc_mcp_client::McpManager;
use serde_json::Value;

pub struct ToolRegistry<'a> {
    mcp: &'a McpManager,
    owner: HashMap<String, String>,
}

impl<'a> ToolRegistry<'a> {
    pub fn build(mcp: &'a McpManager) -> Self {
        let mut owner = HashMap::new();
        for (server_id, tool) in mcp.list_tools() {
            owner.insert(tool.name.clone(), server_id.to_string());
        }
        Self { mcp, owner }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.mcp
            .list_tools()
            .into_iter()
            .map(|(_, tool)| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            })
            .collect()
    }

    /// Dispatch a tool call by name, returning `(result_text, is_error)`.
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Result<(String, bool)> {
        let server_id = self
            .owner
            .get(tool_name)
            .ok_or_else(|| Error::Mcp(format!("no MCP server exposes tool '{tool_name}'")))?;

        match self.mcp.call_tool(server_id, tool_name, arguments).await {
            Ok(result) => {
                let text = result
                    .content
                    .iter()
                    .map(|c| c.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok((text, result.is_error))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_manager_has_no_tools_and_rejects_calls() {
        let mcp = McpManager::empty();
        let registry = ToolRegistry::build(&mcp);
        assert!(registry.tool_definitions().is_empty());
        let err = registry.call("anything", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::Mcp(_)));
    }
}
