use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bifrost_core::{InboundContext, McpAugmenter};
use bifrost_provider_core::{Message, RequestKind, RequestSpec, ToolCall, ToolSchema};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};

use crate::catalog::{CandidateTool, LocalTool, LocalToolHandler, LocalToolRegistry};
use crate::client::McpClient;
use crate::config::ClientConfig;
use crate::error::{McpError, McpResult};
use crate::filter::{self, ClientFilter};

/// Bounds how many tool calls from a single assistant turn run concurrently.
const DEFAULT_TOOL_CALL_CONCURRENCY: usize = 8;

/// The MCP sub-engine's single entry point: discovers, filters, and executes
/// external tools on behalf of chat-shaped requests. Implements
/// [`McpAugmenter`] so `bifrost-core`'s dispatcher can call it without
/// naming this crate.
pub struct McpManager {
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    local: RwLock<LocalToolRegistry>,
    tool_call_concurrency: usize,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            local: RwLock::new(LocalToolRegistry::default()),
            tool_call_concurrency: DEFAULT_TOOL_CALL_CONCURRENCY,
        }
    }

    pub fn with_tool_call_concurrency(mut self, limit: usize) -> Self {
        self.tool_call_concurrency = limit.max(1);
        self
    }

    /// Opens the connection, performs the handshake, and caches the
    /// client's tool list. Rejects a name already used by another client or
    /// a local tool.
    pub async fn register_client(&self, config: ClientConfig) -> McpResult<()> {
        if self.name_in_use(&config.name).await {
            return Err(McpError::DuplicateName(config.name));
        }

        let client = McpClient::connect(&config).await?;
        self.clients.write().await.insert(config.name.clone(), Arc::new(client));
        Ok(())
    }

    /// Installs an in-process handler; `name` must be unique across every
    /// registered client and local tool.
    pub async fn register_local_tool(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        parameters: Value,
        handler: Arc<dyn LocalToolHandler>,
    ) -> McpResult<()> {
        let name = name.into();
        if self.name_in_use(&name).await {
            return Err(McpError::DuplicateName(name));
        }

        self.local.write().await.insert(
            name,
            LocalTool {
                description,
                parameters,
                handler,
            },
        );
        Ok(())
    }

    async fn name_in_use(&self, name: &str) -> bool {
        if self.local.read().await.contains(name) {
            return true;
        }
        self.clients.read().await.contains_key(name)
    }

    /// Step 1-4 of `AugmentRequest`: the effective, filtered candidate set
    /// across healthy clients and local tools, before the user-supplied
    /// union in step 5.
    async fn filtered_candidates(&self, options: &bifrost_core::McpRequestOptions) -> Vec<CandidateTool> {
        let mut out = Vec::new();

        let clients = self.clients.read().await;
        for client in clients.values() {
            if !client.is_healthy() {
                continue;
            }
            if !filter::resolve_client(Some(client.name()), options) {
                continue;
            }

            let client_filter = ClientFilter {
                tools_to_execute: &client.tools_to_execute,
                skip_tools: &client.skip_tools,
            };

            for tool in client.cached_tools().iter() {
                if !filter::resolve_tool(&tool.name, Some(&client_filter), options) {
                    continue;
                }
                out.push(CandidateTool {
                    client: Some(client.name().to_string()),
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                });
            }
        }
        drop(clients);

        let local = self.local.read().await;
        for candidate in local.candidates() {
            if !filter::resolve_tool(&candidate.name, None, options) {
                continue;
            }
            out.push(candidate);
        }

        out
    }

    /// Dispatches a single tool call by name, preferring a local handler
    /// over a client catalog entry, and always returning a tool-role
    /// message — on failure the content is the stringified error rather
    /// than a propagated `Result`, since "tool-call protocol survival
    /// requires a response for every tool-call id".
    pub async fn execute_tool_call(&self, tool_call: &ToolCall) -> Message {
        let name = &tool_call.function.name;
        let arguments: Value = serde_json::from_str(&tool_call.function.arguments).unwrap_or(Value::Null);

        let result = self.dispatch_tool_call(name, arguments).await;
        let content = match result {
            Ok(text) => text,
            Err(err) => format!("error: {err}"),
        };
        Message::tool_result(tool_call.id.clone(), content)
    }

    /// Executes every tool call from one assistant turn concurrently, bounded
    /// by `tool_call_concurrency`; order of the returned messages matches
    /// the input order regardless of completion order.
    pub async fn execute_tool_calls(&self, tool_calls: &[ToolCall]) -> Vec<Message> {
        let semaphore = Arc::new(Semaphore::new(self.tool_call_concurrency));
        let mut handles = Vec::with_capacity(tool_calls.len());

        for call in tool_calls.iter().cloned() {
            let semaphore = semaphore.clone();
            handles.push(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                self.execute_tool_call(&call).await
            });
        }

        futures_util::future::join_all(handles).await
    }

    async fn dispatch_tool_call(&self, name: &str, arguments: Value) -> Result<String, String> {
        if let Some(local) = self.local.read().await.get(name) {
            return local
                .handler
                .call(arguments)
                .await
                .map(|value| value.to_string());
        }

        let clients = self.clients.read().await;
        for client in clients.values() {
            if !client.is_healthy() {
                continue;
            }
            let has_tool = client.cached_tools().iter().any(|t| t.name == name);
            if !has_tool {
                continue;
            }
            return client
                .call_tool(name, arguments)
                .await
                .map(|result| result.as_text())
                .map_err(|e| e.to_string());
        }

        Err(McpError::UnknownTool(name.to_string()).to_string())
    }

    /// Merges discovered tool schemas onto `spec.params.tools`, idempotent
    /// across fallback re-entries because the shadow rule treats a
    /// previously-injected discovered tool as user-supplied on the next pass.
    async fn augment(&self, ctx: &InboundContext, mut spec: RequestSpec) -> RequestSpec {
        if spec.kind != RequestKind::Chat {
            return spec;
        }

        let candidates = self.filtered_candidates(ctx.mcp_options()).await;

        let existing = spec.params.tools.get_or_insert_with(Vec::new);
        let mut seen: std::collections::HashSet<String> = existing.iter().map(|t| t.name.clone()).collect();

        for candidate in candidates {
            if seen.contains(&candidate.name) {
                continue;
            }
            seen.insert(candidate.name.clone());
            existing.push(ToolSchema {
                name: candidate.name,
                description: candidate.description,
                parameters: candidate.parameters,
            });
        }

        spec
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpAugmenter for McpManager {
    async fn augment_request(&self, ctx: &InboundContext, spec: RequestSpec) -> RequestSpec {
        self.augment(ctx, spec).await
    }
}
