use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// An in-process tool handler installed via `RegisterLocalTool`.
/// Execution runs in the calling task — no transport, no network hop.
#[async_trait]
pub trait LocalToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, String>;
}

pub struct LocalTool {
    pub description: Option<String>,
    pub parameters: Value,
    pub handler: Arc<dyn LocalToolHandler>,
}

/// One entry in the effective tool set computed by `AugmentRequest`: either
/// sourced from a client's cached catalog or from a locally-registered
/// handler (`client: None`).
#[derive(Debug, Clone)]
pub struct CandidateTool {
    pub client: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// The locally-registered handler map. Client catalogs live on each [`crate::client::McpClient`]
/// instead — this struct only owns the local side.
#[derive(Default)]
pub struct LocalToolRegistry {
    tools: HashMap<String, LocalTool>,
}

impl LocalToolRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn insert(&mut self, name: String, tool: LocalTool) {
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&LocalTool> {
        self.tools.get(name)
    }

    pub fn candidates(&self) -> impl Iterator<Item = CandidateTool> + '_ {
        self.tools.iter().map(|(name, tool)| CandidateTool {
            client: None,
            name: name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        })
    }
}
