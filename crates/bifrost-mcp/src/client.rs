use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::McpResult;
use crate::protocol::{CallToolResult, ToolDescriptor};
use crate::transport::{self, AnyTransport, Transport};

/// A registered MCP client: connection handle, health flag, and a
/// read-mostly cached tool catalog that swaps under `ArcSwap` on rediscovery
///.
pub struct McpClient {
    name: String,
    transport: AnyTransport,
    healthy: AtomicBool,
    tools: ArcSwap<Vec<ToolDescriptor>>,
    pub tools_to_execute: BTreeSet<String>,
    pub skip_tools: BTreeSet<String>,
}

impl McpClient {
    pub async fn connect(config: &ClientConfig) -> McpResult<Self> {
        let transport = transport::connect(&config.name, &config.connection).await?;
        let tools = transport.list_tools().await?;

        Ok(Self {
            name: config.name.clone(),
            transport,
            healthy: AtomicBool::new(true),
            tools: ArcSwap::from_pointee(tools),
            tools_to_execute: config.tools_to_execute.clone(),
            skip_tools: config.skip_tools.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn cached_tools(&self) -> arc_swap::Guard<std::sync::Arc<Vec<ToolDescriptor>>> {
        self.tools.load()
    }

    /// Re-runs tool discovery against the live connection, swapping the
    /// cached catalog in place; marks the client unhealthy on failure rather
    /// than evicting its last-known-good catalog.
    pub async fn refresh(&self) {
        match self.transport.list_tools().await {
            Ok(tools) => {
                self.tools.store(std::sync::Arc::new(tools));
                self.healthy.store(true, Ordering::Release);
            }
            Err(_) => self.healthy.store(false, Ordering::Release),
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.transport.call_tool(name, arguments).await
    }
}
