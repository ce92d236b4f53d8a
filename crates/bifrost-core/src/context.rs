use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Request-scoped MCP filter overrides: the HTTP transport
/// translates the `X-BF-MCP-*` headers into this record at ingress rather
/// than piggybacking untyped context values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpRequestOptions {
    pub include_clients: Vec<String>,
    pub exclude_clients: Vec<String>,
    pub include_tools: Vec<String>,
    pub exclude_tools: Vec<String>,
}

/// Carries the inbound request's identity and cancellation signal through
/// the whole pipeline: pre-hooks, MCP augmentation, worker queue wait,
/// upstream call, post-hooks, and any fallback re-entry.
#[derive(Debug, Clone)]
pub struct InboundContext {
    request_id: Uuid,
    cancel: CancellationToken,
    mcp_options: Arc<McpRequestOptions>,
}

impl InboundContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            mcp_options: Arc::new(McpRequestOptions::default()),
        }
    }

    pub fn with_mcp_options(mut self, options: McpRequestOptions) -> Self {
        self.mcp_options = Arc::new(options);
        self
    }

    pub fn mcp_options(&self) -> &McpRequestOptions {
        &self.mcp_options
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A child token for a single fallback attempt or MCP tool execution;
    /// canceling the parent always cancels children, canceling a child never
    /// affects the parent or sibling attempts.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

impl Default for InboundContext {
    fn default() -> Self {
        Self::new()
    }
}
