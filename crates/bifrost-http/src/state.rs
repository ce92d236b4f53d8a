use std::sync::Arc;

use bifrost_core::Dispatcher;
use bifrost_mcp::McpManager;

/// Shared handle injected into every route via `.with_state`.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// `/v1/mcp/tool/execute` dispatches straight to the MCP manager instead
    /// of through the dispatcher; `None` when MCP is disabled
    /// (`GlobalConfig::mcp_enabled == false`).
    pub mcp: Option<Arc<McpManager>>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, mcp: Option<Arc<McpManager>>) -> Self {
        Self { dispatcher, mcp }
    }
}
