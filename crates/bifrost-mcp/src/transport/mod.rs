mod http;
mod stdio;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConnectionKind;
use crate::error::McpResult;
use crate::protocol::{CallToolResult, ToolDescriptor};

pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// One wire encoding of the MCP JSON-RPC handshake: spawn-and-frame for
/// stdio, request/response (or SSE) over `reqwest` otherwise.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>>;
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult>;
}

pub enum AnyTransport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

#[async_trait]
impl Transport for AnyTransport {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        match self {
            AnyTransport::Stdio(t) => t.list_tools().await,
            AnyTransport::Http(t) => t.list_tools().await,
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        match self {
            AnyTransport::Stdio(t) => t.call_tool(name, arguments).await,
            AnyTransport::Http(t) => t.call_tool(name, arguments).await,
        }
    }
}

pub async fn connect(client_name: &str, connection: &ConnectionKind) -> McpResult<AnyTransport> {
    match connection {
        ConnectionKind::Stdio { command, args, env } => {
            Ok(AnyTransport::Stdio(StdioTransport::spawn(client_name, command, args, env).await?))
        }
        ConnectionKind::Http { url, headers } => Ok(AnyTransport::Http(HttpTransport::new(
            client_name,
            url,
            headers,
            http::HttpMode::Streamable,
        )?)),
        ConnectionKind::Sse { url, headers } => Ok(AnyTransport::Http(HttpTransport::new(
            client_name,
            url,
            headers,
            http::HttpMode::Sse,
        )?)),
    }
}
