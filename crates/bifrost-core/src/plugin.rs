use std::sync::Arc;

use async_trait::async_trait;
use bifrost_provider_core::{RequestSpec, Response};
use tracing::{info_span, Instrument};

use crate::context::InboundContext;
use crate::error::Error;

/// A pre-hook's directive to bypass the provider call, carrying exactly one
/// of {Response, Error}.
pub enum ShortCircuit {
    Response(Response),
    Error(Error),
}

pub enum PreHookOutcome {
    /// Continue the pipeline with this (possibly modified) spec.
    Continue(RequestSpec),
    ShortCircuit(ShortCircuit),
}

/// Pre/post middleware. Plugin instances are shared across requests and
/// must be internally thread-safe — hence `Send + Sync` and no `&mut
/// self` anywhere in the trait.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Returning `Err` aborts the pipeline for this attempt as if the
    /// plugin had short-circuited with that error and `fallbacks_allowed =
    /// false`, regardless of what the error itself carries.
    async fn pre_hook(&self, ctx: &InboundContext, spec: RequestSpec) -> Result<PreHookOutcome, Error>;

    /// Either input may be `None`; at least one is `Some` on entry. Returning
    /// `(Some(response), Some(Error::empty()))` recovers a failed attempt;
    /// returning `(None, Some(err))` invalidates a successful one.
    async fn post_hook(
        &self,
        ctx: &InboundContext,
        response: Option<Response>,
        error: Option<Error>,
    ) -> (Option<Response>, Option<Error>);

    /// Called once on gateway shutdown, in reverse registration order.
    /// Errors are logged and never block further cleanup.
    async fn cleanup(&self) {}
}

/// Ordered sequence of plugins with strict symmetric unwinding.
#[derive(Default, Clone)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

/// Outcome of running the pre-hook chain for one attempt.
pub struct PreHookRun {
    pub spec: RequestSpec,
    /// Indices of plugins whose pre-hook ran, in run order.
    pub ran: Vec<usize>,
    pub short_circuit: Option<(Option<Response>, Option<Error>)>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs pre-hooks in registration order. Stops at the first
    /// short-circuit (invariant: pre-hooks after the short-circuiting one,
    /// and the provider call, never run) but still reports every plugin that
    /// ran up to and including that one, for symmetric post-hook unwinding.
    pub async fn run_pre_hooks(&self, ctx: &InboundContext, mut spec: RequestSpec) -> PreHookRun {
        let mut ran = Vec::with_capacity(self.plugins.len());
        for (index, plugin) in self.plugins.iter().enumerate() {
            ran.push(index);
            let span = info_span!("bifrost.pre_hook", plugin = plugin.name());
            match plugin.pre_hook(ctx, spec.clone()).instrument(span).await {
                Ok(PreHookOutcome::Continue(next_spec)) => spec = next_spec,
                Ok(PreHookOutcome::ShortCircuit(ShortCircuit::Response(response))) => {
                    return PreHookRun { spec, ran, short_circuit: Some((Some(response), None)) };
                }
                Ok(PreHookOutcome::ShortCircuit(ShortCircuit::Error(error))) => {
                    return PreHookRun { spec, ran, short_circuit: Some((None, Some(error))) };
                }
                Err(error) => {
                    let error = error.with_fallbacks_allowed(false);
                    return PreHookRun { spec, ran, short_circuit: Some((None, Some(error))) };
                }
            }
        }
        PreHookRun { spec, ran, short_circuit: None }
    }

    /// Runs post-hooks in reverse order over exactly the plugins whose
    /// pre-hook ran this attempt.
    pub async fn run_post_hooks(
        &self,
        ctx: &InboundContext,
        ran: &[usize],
        mut response: Option<Response>,
        mut error: Option<Error>,
    ) -> (Option<Response>, Option<Error>) {
        for &index in ran.iter().rev() {
            let plugin = &self.plugins[index];
            let span = info_span!("bifrost.post_hook", plugin = plugin.name());
            let (next_response, next_error) = plugin
                .post_hook(ctx, response, error)
                .instrument(span)
                .await;
            response = next_response;
            error = next_error;
        }
        (response, error)
    }

    /// Runs `Plugin::cleanup` on every registered plugin, in reverse
    /// registration order, exactly once, tolerating panicking futures by
    /// simply moving on (cleanup failures never block shutdown).
    pub async fn cleanup_all(&self) {
        for plugin in self.plugins.iter().rev() {
            plugin.cleanup().await;
        }
    }
}
