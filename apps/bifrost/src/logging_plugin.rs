use std::time::Instant;

use async_trait::async_trait;
use bifrost_core::{Error, InboundContext, Plugin, PreHookOutcome};
use bifrost_provider_core::{RequestSpec, Response};
use dashmap::DashMap;
use uuid::Uuid;

/// Logs one `tracing` event per dispatch attempt with its observed latency.
///
/// The start time can't live on the plugin itself (plugin instances are
/// shared across every in-flight request) so it is keyed by request id in a
/// concurrent map and removed in `post_hook` — exactly the kind of
/// per-request state `PluginPipeline`'s symmetric unwinding is built to make
/// tractable.
#[derive(Default)]
pub struct TracingPlugin {
    started: DashMap<Uuid, Instant>,
}

impl TracingPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for TracingPlugin {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn pre_hook(&self, ctx: &InboundContext, spec: RequestSpec) -> Result<PreHookOutcome, Error> {
        self.started.insert(ctx.request_id(), Instant::now());
        tracing::debug!(
            request_id = %ctx.request_id(),
            provider = %spec.provider,
            model = %spec.model,
            "dispatch attempt starting"
        );
        Ok(PreHookOutcome::Continue(spec))
    }

    async fn post_hook(
        &self,
        ctx: &InboundContext,
        response: Option<Response>,
        error: Option<Error>,
    ) -> (Option<Response>, Option<Error>) {
        let elapsed = self
            .started
            .remove(&ctx.request_id())
            .map(|(_, started)| started.elapsed());

        match &error {
            Some(err) if !err.is_empty() => {
                tracing::warn!(request_id = %ctx.request_id(), ?elapsed, error = %err, "dispatch attempt failed");
            }
            _ => {
                tracing::info!(request_id = %ctx.request_id(), ?elapsed, "dispatch attempt finished");
            }
        }

        (response, error)
    }
}
