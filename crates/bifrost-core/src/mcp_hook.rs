use async_trait::async_trait;
use bifrost_provider_core::RequestSpec;

use crate::context::InboundContext;

/// The seam the MCP sub-engine attaches to at Submit step 3.
/// `bifrost-core` depends only on this trait, never on `bifrost-mcp`
/// directly, so the dispatcher can run with MCP disabled by simply not
/// wiring an implementation in.
#[async_trait]
pub trait McpAugmenter: Send + Sync {
    /// Returns `spec` with its tool list (and, if the request kind carries
    /// one, tool_choice) augmented with whatever tools the filter
    /// composition for this request resolves to. A no-op implementation, or
    /// one that only ever returns `spec` unchanged for non-chat kinds, is a
    /// valid `McpAugmenter`.
    async fn augment_request(&self, ctx: &InboundContext, spec: RequestSpec) -> RequestSpec;
}
